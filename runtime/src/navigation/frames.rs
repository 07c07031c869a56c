//! Frame navigator — enter and leave the nested rendering contexts.
//!
//! The list and detail views each live in a named iframe that is rebuilt on
//! every top-level navigation. Anything that leaves the list must come back
//! through [`return_to_list`] before touching the list again.

use super::wait::Deadline;
use crate::error::{CrawlError, CrawlResult};
use crate::renderer::RenderContext;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Poll for the named frame and enter it once it exists.
///
/// Returns [`CrawlError::Timeout`] if the frame never appears within `budget`.
pub async fn enter_context(
    context: &mut dyn RenderContext,
    name: &str,
    budget: Duration,
    poll: Duration,
) -> CrawlResult<()> {
    let deadline = Deadline::after(budget);
    loop {
        match context.enter_frame(name).await {
            Ok(true) => {
                debug!("entered frame {name}");
                return Ok(());
            }
            Ok(false) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => debug!("frame {name} not ready: {e}"),
        }
        if deadline.expired() {
            return Err(deadline.timeout(format!("frame {name}")));
        }
        sleep(poll).await;
    }
}

/// Unconditionally make the top-level document active.
pub async fn return_to_top(context: &mut dyn RenderContext) -> CrawlResult<()> {
    context.exit_to_top().await
}

/// Navigate back from a detail view and re-enter the list frame.
pub async fn return_to_list(
    context: &mut dyn RenderContext,
    list_frame: &str,
    budget: Duration,
    poll: Duration,
) -> CrawlResult<()> {
    return_to_top(context).await?;
    context.go_back().await?;
    enter_context(context, list_frame, budget, poll)
        .await
        .map_err(|e| match e {
            CrawlError::Timeout { waited, .. } => {
                CrawlError::timeout(format!("return to {list_frame}"), waited)
            }
            other => other,
        })
}
