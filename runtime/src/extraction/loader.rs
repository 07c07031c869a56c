//! Convergent loader — reveal content until the document stops growing.
//!
//! One primitive covers scroll-paginated lists and "load more" buttons:
//! trigger, let the page settle, measure, and stop on two equal
//! measurements in a row or at the iteration ceiling. [`expand_each`] is the
//! one-shot sibling used for per-item "expand" toggles.

use crate::error::{CrawlError, CrawlResult};
use crate::navigation::wait;
use crate::renderer::RenderContext;
use crate::selectors::Locator;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// A way of asking the document for more content, and of measuring it.
#[async_trait]
pub trait Reveal: Send {
    async fn trigger(&mut self, context: &dyn RenderContext) -> CrawlResult<()>;
    async fn measure(&mut self, context: &dyn RenderContext) -> CrawlResult<u64>;
}

#[derive(Debug, Clone, Copy)]
pub struct DrainPolicy {
    pub max_iterations: usize,
    /// Wait between trigger and measurement.
    pub settle: Duration,
}

/// Why a drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// Two consecutive measurements were equal.
    FixedPoint,
    /// `max_iterations` triggers were issued.
    Ceiling,
    /// The trigger control is gone; nothing more can be revealed.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drained {
    /// Trigger attempts made.
    pub iterations: usize,
    /// Last successful measurement.
    pub extent: Option<u64>,
    pub stop: Stop,
}

/// Trigger and measure until a fixed point or the ceiling.
///
/// Only session-fatal errors propagate. A trigger reporting absence or a
/// timeout ends the drain as [`Stop::Exhausted`]; a stale trigger or
/// measurement is logged and the loop carries on.
pub async fn drain(
    context: &dyn RenderContext,
    reveal: &mut dyn Reveal,
    policy: DrainPolicy,
) -> CrawlResult<Drained> {
    let mut last: Option<u64> = None;
    let mut iterations = 0;

    while iterations < policy.max_iterations {
        iterations += 1;

        match reveal.trigger(context).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e @ (CrawlError::Absent(_) | CrawlError::Timeout { .. })) => {
                debug!("drain exhausted after {iterations} rounds: {e}");
                return Ok(Drained {
                    iterations,
                    extent: last,
                    stop: Stop::Exhausted,
                });
            }
            Err(e) => debug!("trigger round {iterations} failed: {e}"),
        }

        sleep(policy.settle).await;

        let current = match reveal.measure(context).await {
            Ok(m) => m,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                debug!("measure round {iterations} failed: {e}");
                continue;
            }
        };

        if last == Some(current) {
            return Ok(Drained {
                iterations,
                extent: Some(current),
                stop: Stop::FixedPoint,
            });
        }
        last = Some(current);
    }

    Ok(Drained {
        iterations,
        extent: last,
        stop: Stop::Ceiling,
    })
}

/// Scroll a container to its bottom; measure its scroll height.
pub struct ScrollContainer {
    pub container: Locator,
}

#[async_trait]
impl Reveal for ScrollContainer {
    async fn trigger(&mut self, context: &dyn RenderContext) -> CrawlResult<()> {
        context.scroll_to_bottom(Some(&self.container)).await
    }

    async fn measure(&mut self, context: &dyn RenderContext) -> CrawlResult<u64> {
        context.scroll_height(Some(&self.container)).await
    }
}

/// Scroll the window down, wait for a "more" control, click it; measure the
/// number of rendered items.
pub struct MoreButton {
    pub control: Locator,
    pub items: Locator,
    pub wait: Duration,
    pub poll: Duration,
}

#[async_trait]
impl Reveal for MoreButton {
    async fn trigger(&mut self, context: &dyn RenderContext) -> CrawlResult<()> {
        context.scroll_to_bottom(None).await?;
        wait::until_present(context, &self.control, self.wait, self.poll).await?;
        context.click_at(&self.control, 0, None).await
    }

    async fn measure(&mut self, context: &dyn RenderContext) -> CrawlResult<u64> {
        Ok(context.count(&self.items).await? as u64)
    }
}

/// Outcome of a one-shot expansion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Expanded {
    pub found: usize,
    pub expanded: usize,
    pub failed: usize,
}

/// Click every control matching `control` once.
///
/// Controls are addressed from the last to the first so a control that
/// disappears once clicked cannot shift the index of one not yet visited.
/// A failing control is counted and skipped.
pub async fn expand_each(
    context: &dyn RenderContext,
    control: &Locator,
    settle: Duration,
) -> CrawlResult<Expanded> {
    let found = match context.count(control).await {
        Ok(n) => n,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            debug!("could not count {control}: {e}");
            0
        }
    };

    let mut outcome = Expanded {
        found,
        ..Expanded::default()
    };

    for index in (0..found).rev() {
        match context.click_at(control, index, None).await {
            Ok(()) => outcome.expanded += 1,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                debug!("expand {index} skipped: {e}");
                outcome.failed += 1;
            }
        }
        sleep(settle).await;
    }

    Ok(outcome)
}
