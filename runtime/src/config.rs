//! Run configuration: browser options, named waits, ceilings, site profile.
//!
//! Precedence is defaults < JSON file < `HARVEST_*` environment < CLI flags.
//! The CLI layer applies its flags on top of what [`CrawlConfig::load`] returns.

use crate::selectors::SiteProfile;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Desktop Chrome identity presented to the site.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36";

/// Home directory for harvest state (`$HARVEST_HOME` or `~/.place-harvest`).
pub fn harvest_home() -> PathBuf {
    if let Ok(p) = std::env::var("HARVEST_HOME") {
        return PathBuf::from(p);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".place-harvest")
}

/// Durations serialized as integer milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Named waits, one per wait class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Top-level page load.
    #[serde(with = "duration_ms")]
    pub navigation: Duration,
    /// Entering the list frame after the search page loads.
    #[serde(with = "duration_ms")]
    pub list_attach: Duration,
    /// Entering the list frame again after returning from a detail page.
    #[serde(with = "duration_ms")]
    pub return_attach: Duration,
    /// List scroll container presence.
    #[serde(with = "duration_ms")]
    pub container_wait: Duration,
    /// URL reflecting a detail page after clicking an entry.
    #[serde(with = "duration_ms")]
    pub detail_url_wait: Duration,
    /// Entering the detail frame.
    #[serde(with = "duration_ms")]
    pub detail_attach: Duration,
    /// Reviews tab becoming present.
    #[serde(with = "duration_ms")]
    pub reviews_tab_wait: Duration,
    /// "More reviews" control becoming present.
    #[serde(with = "duration_ms")]
    pub more_control_wait: Duration,
    /// Interval between presence probes.
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,
    /// After each scroll of the list container.
    #[serde(with = "duration_ms")]
    pub scroll_settle: Duration,
    /// After scrolling an entry into view.
    #[serde(with = "duration_ms")]
    pub item_settle: Duration,
    /// After clicking an entry, before watching the URL.
    #[serde(with = "duration_ms")]
    pub click_settle: Duration,
    /// After advancing to the next result page.
    #[serde(with = "duration_ms")]
    pub pagination_settle: Duration,
    /// After activating the reviews tab.
    #[serde(with = "duration_ms")]
    pub tab_settle: Duration,
    /// After each "more reviews" round.
    #[serde(with = "duration_ms")]
    pub more_settle: Duration,
    /// Between individual expand clicks.
    #[serde(with = "duration_ms")]
    pub expand_settle: Duration,
    /// Before the final review text read.
    #[serde(with = "duration_ms")]
    pub final_settle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(30),
            list_attach: Duration::from_secs(10),
            return_attach: Duration::from_secs(15),
            container_wait: Duration::from_secs(10),
            detail_url_wait: Duration::from_secs(100),
            detail_attach: Duration::from_secs(20),
            reviews_tab_wait: Duration::from_secs(20),
            more_control_wait: Duration::from_secs(5),
            poll_interval: Duration::from_millis(250),
            scroll_settle: Duration::from_millis(1500),
            item_settle: Duration::from_millis(500),
            click_settle: Duration::from_secs(2),
            pagination_settle: Duration::from_secs(2),
            tab_settle: Duration::from_secs(2),
            more_settle: Duration::from_millis(1500),
            expand_settle: Duration::from_millis(100),
            final_settle: Duration::from_secs(2),
        }
    }
}

/// Iteration ceilings for convergent loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Scroll rounds per result page.
    pub max_list_scrolls: usize,
    /// "More reviews" rounds per establishment.
    pub max_review_rounds: usize,
    /// Upper bound on result pages visited. `None` walks until the last page.
    pub max_pages: Option<u32>,
    /// Random extra delay added between entries, in milliseconds.
    pub jitter_ms: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_list_scrolls: 50,
            max_review_rounds: 10,
            max_pages: None,
            jitter_ms: 300,
        }
    }
}

/// How the browser is launched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserOptions {
    /// Explicit Chromium binary. Discovered when absent.
    pub chromium_path: Option<PathBuf>,
    pub headless: bool,
    pub no_sandbox: bool,
    pub user_agent: String,
    pub accept_language: String,
    pub window_width: u32,
    pub window_height: u32,
    /// Extra command-line switches passed through verbatim.
    pub extra_args: Vec<String>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            chromium_path: None,
            headless: true,
            no_sandbox: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: "ko-KR,ko;q=0.9,en-US;q=0.8".to_string(),
            window_width: 1920,
            window_height: 1080,
            extra_args: Vec::new(),
        }
    }
}

/// Complete configuration of a harvest run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub browser: BrowserOptions,
    pub timeouts: Timeouts,
    pub limits: Limits,
    pub site: SiteProfile,
    /// Where listing, review, and trace files are written.
    pub output_dir: PathBuf,
}

impl CrawlConfig {
    /// Load from an explicit JSON file, else `<harvest_home>/config.json` if it
    /// exists, else defaults; then apply the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_json_file(p)?,
            None => {
                let default_path = harvest_home().join("config.json");
                if default_path.exists() {
                    Self::from_json_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Apply `HARVEST_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(p) = lookup("HARVEST_CHROMIUM_PATH").filter(|p| !p.is_empty()) {
            self.browser.chromium_path = Some(PathBuf::from(p));
        }
        if lookup("HARVEST_CHROMIUM_NO_SANDBOX").is_some() {
            self.browser.no_sandbox = true;
        }
        if lookup("HARVEST_HEADFUL").is_some() {
            self.browser.headless = false;
        }
        if let Some(ua) = lookup("HARVEST_USER_AGENT").filter(|u| !u.is_empty()) {
            self.browser.user_agent = ua;
        }
        if let Some(dir) = lookup("HARVEST_OUTPUT_DIR").filter(|d| !d.is_empty()) {
            self.output_dir = PathBuf::from(dir);
        }
    }
}
