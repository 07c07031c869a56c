//! Chromium render context over the DevTools protocol (chromiumoxide).

use super::{script, Launcher, RenderContext};
use crate::config::BrowserOptions;
use crate::error::{CrawlError, CrawlResult};
use crate::selectors::Locator;
use crate::stealth::fingerprint;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::js_protocol::runtime::{EvaluateParams, ExecutionContextId};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Locate a Chromium binary: `HARVEST_CHROMIUM_PATH`, then `PATH`, then
/// well-known install locations.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("HARVEST_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    let common: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    } else {
        &["/opt/google/chrome/google-chrome", "/snap/bin/chromium"]
    };
    common.iter().map(PathBuf::from).find(|p| p.exists())
}

/// How long chromiumoxide waits for any single DevTools reply.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Map a CDP failure onto the crawl taxonomy.
///
/// Execution contexts die whenever a frame re-renders or navigates, and page
/// scripts throw while a frame is half loaded; both are the transient tier.
/// An unanswered request is a navigation timeout. Anything else means the
/// browser link is unusable.
fn classify(err: CdpError) -> CrawlError {
    match err {
        CdpError::JavascriptException(details) => {
            let thrown = details
                .exception
                .as_ref()
                .and_then(|e| e.description.clone())
                .unwrap_or_else(|| details.text.clone());
            CrawlError::stale(format!("page script threw: {thrown}"))
        }
        CdpError::Timeout => CrawlError::timeout("devtools reply", REQUEST_TIMEOUT),
        other => {
            let msg = other.to_string();
            if msg.contains("Cannot find context with specified id")
                || msg.contains("Execution context was destroyed")
                || msg.contains("Inspected target navigated or closed")
            {
                CrawlError::stale(msg)
            } else {
                CrawlError::session(msg)
            }
        }
    }
}

/// Launches headless (or headful) Chromium with stealth settings.
pub struct ChromiumLauncher {
    options: BrowserOptions,
}

impl ChromiumLauncher {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Launcher for ChromiumLauncher {
    async fn launch(&self) -> CrawlResult<Box<dyn RenderContext>> {
        let context = ChromiumContext::launch(&self.options).await?;
        Ok(Box::new(context))
    }
}

/// One Chromium process with one foreground page.
pub struct ChromiumContext {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    frame: Option<(String, ExecutionContextId)>,
}

impl ChromiumContext {
    pub async fn launch(options: &BrowserOptions) -> CrawlResult<Self> {
        let executable = options
            .chromium_path
            .clone()
            .or_else(find_chromium)
            .ok_or_else(|| {
                CrawlError::session("Chromium not found; set HARVEST_CHROMIUM_PATH")
            })?;

        info!(
            "launching {} (headless={})",
            executable.display(),
            options.headless
        );

        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .window_size(options.window_width, options.window_height)
            .request_timeout(REQUEST_TIMEOUT)
            .args(fingerprint::launch_args(options));
        if !options.headless {
            builder = builder.with_head();
        }
        if options.no_sandbox {
            builder = builder.no_sandbox();
        }
        let config = builder.build().map_err(CrawlError::session)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(CrawlError::session)?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("cdp handler: {e}");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(CrawlError::session)?;

        let ua = SetUserAgentOverrideParams::builder()
            .user_agent(options.user_agent.clone())
            .accept_language(options.accept_language.clone())
            .build()
            .map_err(CrawlError::session)?;
        page.set_user_agent(ua).await.map_err(CrawlError::session)?;

        page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(
            fingerprint::STEALTH_SCRIPT,
        ))
        .await
        .map_err(CrawlError::session)?;

        Ok(Self {
            browser,
            page,
            handler,
            frame: None,
        })
    }

    /// Evaluate in the active frame (or the top document) and return the value.
    async fn eval(&self, expression: String) -> CrawlResult<Value> {
        let mut builder = EvaluateParams::builder()
            .expression(expression)
            .return_by_value(true)
            .await_promise(true);
        if let Some((_, ctx)) = &self.frame {
            builder = builder.context_id(*ctx);
        }
        let params = builder.build().map_err(CrawlError::session)?;

        let result = self.page.evaluate_expression(params).await.map_err(classify)?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn run(&self, expression: String, what: &str) -> CrawlResult<Value> {
        let reply = self.eval(expression).await?;
        script::interpret(reply, what)
    }

    /// Evaluate in the top-level document regardless of the active frame.
    async fn eval_top(&self, expression: &str) -> CrawlResult<Value> {
        let result = self.page.evaluate(expression).await.map_err(classify)?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> CrawlResult<()> {
        self.frame = None;
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(classify(e)),
            Err(_) => Err(CrawlError::timeout(format!("load of {url}"), timeout)),
        }
    }

    async fn current_url(&self) -> CrawlResult<String> {
        let href = self.eval_top("window.location.href").await?;
        Ok(href.as_str().unwrap_or_default().to_string())
    }

    async fn go_back(&mut self) -> CrawlResult<()> {
        self.frame = None;
        self.eval_top("history.back()").await?;
        Ok(())
    }

    async fn enter_frame(&mut self, name: &str) -> CrawlResult<bool> {
        let frames = self.page.frames().await.map_err(classify)?;
        for id in frames {
            let frame_name = self.page.frame_name(id.clone()).await.map_err(classify)?;
            if frame_name.as_deref() != Some(name) {
                continue;
            }
            if let Some(ctx) = self
                .page
                .frame_execution_context(id)
                .await
                .map_err(classify)?
            {
                self.frame = Some((name.to_string(), ctx));
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn exit_to_top(&mut self) -> CrawlResult<()> {
        self.frame = None;
        Ok(())
    }

    fn active_frame(&self) -> Option<&str> {
        self.frame.as_ref().map(|(name, _)| name.as_str())
    }

    async fn count(&self, locator: &Locator) -> CrawlResult<usize> {
        let value = self.run(script::count(locator), "count").await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn texts(&self, locator: &Locator) -> CrawlResult<Vec<String>> {
        let value = self.run(script::texts(locator), "texts").await?;
        Ok(value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn text_at(
        &self,
        locator: &Locator,
        index: usize,
        child: Option<&Locator>,
    ) -> CrawlResult<String> {
        let what = format!("text of {locator}[{index}]");
        let value = self.run(script::text_at(locator, index, child), &what).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute_at(
        &self,
        locator: &Locator,
        index: usize,
        name: &str,
    ) -> CrawlResult<Option<String>> {
        let what = format!("{name} of {locator}[{index}]");
        let value = self
            .run(script::attribute_at(locator, index, name), &what)
            .await?;
        Ok(value.as_str().map(String::from))
    }

    async fn click_at(
        &self,
        locator: &Locator,
        index: usize,
        child: Option<&Locator>,
    ) -> CrawlResult<()> {
        let what = format!("click on {locator}[{index}]");
        self.run(script::click_at(locator, index, child), &what)
            .await
            .map(|_| ())
    }

    async fn scroll_to_bottom(&self, container: Option<&Locator>) -> CrawlResult<()> {
        self.run(script::scroll_to_bottom(container), "scroll container")
            .await
            .map(|_| ())
    }

    async fn scroll_height(&self, container: Option<&Locator>) -> CrawlResult<u64> {
        let value = self
            .run(script::scroll_height(container), "scroll container")
            .await?;
        Ok(value.as_u64().unwrap_or(0))
    }

    async fn close(self: Box<Self>) -> CrawlResult<()> {
        let mut this = self;
        let closed = this.browser.close().await;
        if let Err(e) = this.browser.wait().await {
            debug!("chromium exit: {e}");
        }
        this.handler.abort();
        closed.map(|_| ()).map_err(CrawlError::session)
    }
}
