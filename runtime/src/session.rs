//! Session controller — one browser per run, always torn down.
//!
//! [`scoped`] launches the browser, runs the work against its tab, and
//! closes it exactly once: after success, after failure, after a panic in
//! the work, and when SIGINT or SIGTERM arrives mid-run (the work future is
//! dropped first). A browser that cannot be launched is session-fatal and is
//! not retried.

use crate::error::{CrawlError, CrawlResult};
use crate::renderer::{Launcher, RenderContext};
use futures::FutureExt;
use std::future::Future;
use std::ops::AsyncFnOnce;
use std::panic::AssertUnwindSafe;
use tracing::{info, warn};

enum Outcome<T> {
    Done(std::thread::Result<T>),
    Interrupted(&'static str),
}

/// Run `work` inside a browser session that ends with the process signals.
pub async fn scoped<T, F>(launcher: &dyn Launcher, work: F) -> CrawlResult<T>
where
    F: AsyncFnOnce(&mut dyn RenderContext) -> T,
{
    scoped_until(launcher, shutdown_signal(), work).await
}

/// Like [`scoped`], interrupted by `shutdown` instead of process signals.
pub async fn scoped_until<T, F, S>(launcher: &dyn Launcher, shutdown: S, work: F) -> CrawlResult<T>
where
    F: AsyncFnOnce(&mut dyn RenderContext) -> T,
    S: Future<Output = &'static str>,
{
    let mut context = launcher.launch().await?;
    info!("browser session opened");

    let outcome = {
        let run = AssertUnwindSafe(work(context.as_mut())).catch_unwind();
        tokio::select! {
            result = run => Outcome::Done(result),
            signal = shutdown => Outcome::Interrupted(signal),
        }
    };

    match context.close().await {
        Ok(()) => info!("browser session closed"),
        Err(e) => warn!("browser teardown failed: {e}"),
    }

    match outcome {
        Outcome::Done(Ok(value)) => Ok(value),
        Outcome::Done(Err(panic)) => std::panic::resume_unwind(panic),
        Outcome::Interrupted(signal) => {
            warn!("run interrupted by {signal}");
            Err(CrawlError::session(format!("interrupted by {signal}")))
        }
    }
}

async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Resolves with the signal name on SIGINT or SIGTERM.
pub async fn shutdown_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => tokio::select! {
                _ = ctrl_c() => "SIGINT",
                _ = term.recv() => "SIGTERM",
            },
            Err(_) => {
                ctrl_c().await;
                "SIGINT"
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c().await;
        "SIGINT"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::fake::{FakeContext, FakeLauncher, SEARCH_URL};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn launcher() -> FakeLauncher {
        FakeLauncher::new(FakeContext::new(vec![]))
    }

    fn never() -> std::future::Pending<&'static str> {
        std::future::pending()
    }

    #[tokio::test]
    async fn test_closes_after_success() {
        let launcher = launcher();
        let url = scoped_until(&launcher, never(), async |ctx: &mut dyn RenderContext| {
            ctx.navigate(SEARCH_URL, Duration::from_secs(1)).await.unwrap();
            ctx.current_url().await.unwrap()
        })
        .await
        .unwrap();

        assert_eq!(url, SEARCH_URL);
        assert_eq!(launcher.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_closes_after_failure() {
        let launcher = launcher();
        let result = scoped_until(&launcher, never(), async |ctx: &mut dyn RenderContext| {
            ctx.enter_frame("searchIframe").await?;
            Err::<(), _>(CrawlError::absent("list"))
        })
        .await
        .unwrap();

        assert!(result.is_err());
        assert_eq!(launcher.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_closes_after_panic() {
        let launcher = launcher();
        let run = scoped_until(&launcher, never(), async |_ctx: &mut dyn RenderContext| {
            panic!("harvester bug");
        });
        assert!(AssertUnwindSafe(run).catch_unwind().await.is_err());
        assert_eq!(launcher.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_signal_drops_work_and_closes() {
        let launcher = launcher();
        let err = scoped_until(&launcher, async { "SIGTERM" }, async |_ctx: &mut dyn RenderContext| {
            std::future::pending::<()>().await
        })
        .await
        .unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "session failure: interrupted by SIGTERM");
        assert_eq!(launcher.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unavailable_browser_is_fatal_without_close() {
        let launcher = FakeLauncher::unavailable();
        let err = scoped_until(&launcher, never(), async |_ctx: &mut dyn RenderContext| ())
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(launcher.closed.load(Ordering::SeqCst), 0);
    }
}
