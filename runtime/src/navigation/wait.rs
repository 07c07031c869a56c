//! Bounded polling waits.
//!
//! Every wait has a budget and a poll interval, both taken from
//! [`Timeouts`](crate::config::Timeouts). Expiry surfaces as
//! [`CrawlError::Timeout`]; nothing waits unboundedly.

use crate::error::{CrawlError, CrawlResult};
use crate::renderer::RenderContext;
use crate::selectors::Locator;
use regex::Regex;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// A wait budget started now.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    pub fn timeout(&self, what: impl Into<String>) -> CrawlError {
        CrawlError::timeout(what, self.budget)
    }
}

/// Wait until at least one node matches `locator`. Returns the match count.
///
/// Transient failures while probing count as "not yet".
pub async fn until_present(
    context: &dyn RenderContext,
    locator: &Locator,
    budget: Duration,
    poll: Duration,
) -> CrawlResult<usize> {
    let deadline = Deadline::after(budget);
    loop {
        match context.count(locator).await {
            Ok(n) if n > 0 => return Ok(n),
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => debug!("probe of {locator} failed: {e}"),
        }
        if deadline.expired() {
            return Err(deadline.timeout(locator.to_string()));
        }
        sleep(poll).await;
    }
}

/// Wait until the top-level URL matches `pattern`. Returns that URL.
pub async fn until_url(
    context: &dyn RenderContext,
    pattern: &Regex,
    budget: Duration,
    poll: Duration,
) -> CrawlResult<String> {
    let deadline = Deadline::after(budget);
    loop {
        match context.current_url().await {
            Ok(url) if pattern.is_match(&url) => return Ok(url),
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => debug!("url probe failed: {e}"),
        }
        if deadline.expired() {
            return Err(deadline.timeout(format!("url matching {pattern}")));
        }
        sleep(poll).await;
    }
}
