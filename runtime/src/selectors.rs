//! Selector contract — the one place that knows the site's markup.
//!
//! Control logic refers to elements by [`Target`] only. When the site's
//! markup drifts, the table (or a JSON override of it) changes and nothing
//! else does.

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use url::Url;

/// A locator expression understood by a render context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locator {
    /// CSS selector, resolved with `querySelectorAll`.
    Css(String),
    /// XPath expression, resolved as an ordered snapshot.
    XPath(String),
}

impl Locator {
    pub fn css(expr: &str) -> Self {
        Self::Css(expr.to_string())
    }

    pub fn xpath(expr: &str) -> Self {
        Self::XPath(expr.to_string())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(e) => write!(f, "css={e}"),
            Self::XPath(e) => write!(f, "xpath={e}"),
        }
    }
}

/// Logical elements the harvesters interact with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    ListContainer,
    ListEntry,
    EntryName,
    EntryCategory,
    NextPage,
    ReviewsTab,
    MoreReviews,
    ReviewExpand,
    ReviewBody,
}

impl Target {
    pub const ALL: [Target; 9] = [
        Target::ListContainer,
        Target::ListEntry,
        Target::EntryName,
        Target::EntryCategory,
        Target::NextPage,
        Target::ReviewsTab,
        Target::MoreReviews,
        Target::ReviewExpand,
        Target::ReviewBody,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Target::ListContainer => "list container",
            Target::ListEntry => "list entry",
            Target::EntryName => "entry name",
            Target::EntryCategory => "entry category",
            Target::NextPage => "next page control",
            Target::ReviewsTab => "reviews tab",
            Target::MoreReviews => "more reviews control",
            Target::ReviewExpand => "review expand control",
            Target::ReviewBody => "review body",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Versioned mapping from logical target to locator.
///
/// `EntryName` and `EntryCategory` are relative to a `ListEntry` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorTable {
    pub version: String,
    /// Frame (iframe name) holding the search result list.
    pub list_frame: String,
    /// Frame (iframe name) holding a place's detail view.
    pub detail_frame: String,
    pub list_container: Locator,
    pub list_entry: Locator,
    pub entry_name: Locator,
    pub entry_category: Locator,
    pub next_page: Locator,
    pub reviews_tab: Locator,
    pub more_reviews: Locator,
    pub review_expand: Locator,
    pub review_body: Locator,
}

impl Default for SelectorTable {
    fn default() -> Self {
        Self {
            version: "2025-06".to_string(),
            list_frame: "searchIframe".to_string(),
            detail_frame: "entryIframe".to_string(),
            list_container: Locator::css("#_pcmap_list_scroll_container"),
            list_entry: Locator::css("#_pcmap_list_scroll_container > ul > li"),
            entry_name: Locator::css("span.TYaxT"),
            entry_category: Locator::css("span.KCMnt"),
            next_page: Locator::xpath(
                "//div[contains(@class, 'zRM9F')]//a[span[text()='다음페이지']]",
            ),
            reviews_tab: Locator::xpath("//a[@role='tab'][.//span[contains(text(), '리뷰')]]"),
            more_reviews: Locator::css("a.fvwqf"),
            review_expand: Locator::css("a.pui__wFzIYl"),
            review_body: Locator::css("div.pui__vn15t2"),
        }
    }
}

impl SelectorTable {
    /// Locator for a logical target.
    pub fn lookup(&self, target: Target) -> &Locator {
        match target {
            Target::ListContainer => &self.list_container,
            Target::ListEntry => &self.list_entry,
            Target::EntryName => &self.entry_name,
            Target::EntryCategory => &self.entry_category,
            Target::NextPage => &self.next_page,
            Target::ReviewsTab => &self.reviews_tab,
            Target::MoreReviews => &self.more_reviews,
            Target::ReviewExpand => &self.review_expand,
            Target::ReviewBody => &self.review_body,
        }
    }

    /// Reverse lookup, used for diagnostics.
    pub fn target_of(&self, locator: &Locator) -> Option<Target> {
        Target::ALL
            .into_iter()
            .find(|t| self.lookup(*t) == locator)
    }

    /// Load a table from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading selector table {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing selector table {}", path.display()))
    }
}

/// Site-specific knowledge beyond element locators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    pub selectors: SelectorTable,
    /// Search page base; the query is appended as one path segment.
    pub search_base: String,
    /// Pattern a resolved detail-page URL must match.
    pub detail_url_pattern: String,
    /// Review bodies containing any of these are not reviews.
    pub noise_markers: Vec<String>,
    /// Label of the collapse toggle that leaks into expanded review text.
    pub collapse_label: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            selectors: SelectorTable::default(),
            search_base: "https://map.naver.com/p/search".to_string(),
            detail_url_pattern: r"/place/\d+".to_string(),
            noise_markers: vec!["거리뷰".to_string()],
            collapse_label: "접기".to_string(),
        }
    }
}

impl SiteProfile {
    /// Search URL for a free-text seed query.
    pub fn search_url(&self, query: &str) -> Result<Url> {
        let mut url = Url::parse(&self.search_base)
            .with_context(|| format!("invalid search base {}", self.search_base))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("search base cannot carry a path: {}", self.search_base))?
            .pop_if_empty()
            .push(query.trim());
        Ok(url)
    }

    pub fn detail_regex(&self) -> Result<Regex> {
        Regex::new(&self.detail_url_pattern)
            .with_context(|| format!("invalid detail url pattern {}", self.detail_url_pattern))
    }
}
