//! Renderer abstraction for browser-driven harvesting.
//!
//! Defines the `Launcher` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide).
//!
//! A `RenderContext` never hands out element handles. Every operation takes
//! a [`Locator`] (plus an index into the *current* render where relevant)
//! and resolves it afresh, so a re-render between two calls can only
//! surface as a [`CrawlError::Stale`](crate::error::CrawlError::Stale), never
//! as a silent read from a detached node.

pub mod chromium;
#[cfg(test)]
pub mod fake;
pub mod script;

use crate::error::CrawlResult;
use crate::selectors::Locator;
use async_trait::async_trait;
use std::time::Duration;

/// Starts a browser and hands back its single foreground tab.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self) -> CrawlResult<Box<dyn RenderContext>>;
}

/// A single browser tab with an optionally active child frame.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Top-level navigation. Leaves the top document active.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> CrawlResult<()>;
    /// URL of the top-level document.
    async fn current_url(&self) -> CrawlResult<String>;
    /// History back in the top-level document. Leaves the top document active.
    async fn go_back(&mut self) -> CrawlResult<()>;
    /// Make the named child frame active. `Ok(false)` if it does not exist yet.
    async fn enter_frame(&mut self, name: &str) -> CrawlResult<bool>;
    /// Make the top-level document active again.
    async fn exit_to_top(&mut self) -> CrawlResult<()>;
    /// Name of the active frame, `None` at top level.
    fn active_frame(&self) -> Option<&str>;

    /// Number of nodes currently matching `locator`.
    async fn count(&self, locator: &Locator) -> CrawlResult<usize>;
    /// Rendered text of every node matching `locator`.
    async fn texts(&self, locator: &Locator) -> CrawlResult<Vec<String>>;
    /// Rendered text of the `index`th match, or of `child` inside it.
    async fn text_at(
        &self,
        locator: &Locator,
        index: usize,
        child: Option<&Locator>,
    ) -> CrawlResult<String>;
    /// Attribute of the `index`th match.
    async fn attribute_at(
        &self,
        locator: &Locator,
        index: usize,
        name: &str,
    ) -> CrawlResult<Option<String>>;
    /// Scroll the `index`th match (or `child` inside it) into view and click it.
    async fn click_at(
        &self,
        locator: &Locator,
        index: usize,
        child: Option<&Locator>,
    ) -> CrawlResult<()>;
    /// Scroll a container (or the window when `None`) to its bottom.
    async fn scroll_to_bottom(&self, container: Option<&Locator>) -> CrawlResult<()>;
    /// Scroll extent of a container (or the document when `None`).
    async fn scroll_height(&self, container: Option<&Locator>) -> CrawlResult<u64>;

    /// Shut the tab and its browser down.
    async fn close(self: Box<Self>) -> CrawlResult<()>;
}
