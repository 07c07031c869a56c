//! Records produced by a harvest run, and the transient navigation state.

use crate::error::{CrawlError, Tier};
use serde::{Deserialize, Serialize};

/// One establishment read from the search result list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    /// Position in the run's output, starting at 1.
    #[serde(rename = "id")]
    pub sequence_id: u32,
    #[serde(rename = "storeName")]
    pub display_name: String,
    pub category: String,
    #[serde(rename = "url")]
    pub detail_url: String,
}

/// One user review collected from a detail page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReviewRecord {
    pub raw_text: String,
    pub normalized_text: String,
}

/// Which rendering context is currently active.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActiveContext {
    #[default]
    Top,
    Frame(String),
}

/// Where the driving component currently stands. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct NavigationState {
    pub context: ActiveContext,
    /// Logical result page, starting at 1.
    pub page: u32,
    /// Last scroll extent (or item count) reported by the convergent loader.
    pub last_extent: Option<u64>,
}

impl NavigationState {
    /// Forget everything tied to the current document after a top-level navigation.
    pub fn reset_to_top(&mut self) {
        self.context = ActiveContext::Top;
        self.last_extent = None;
    }
}

/// An entry or establishment that was passed over, and why.
#[derive(Debug, Clone, Serialize)]
pub struct Skip {
    /// Result page, or 0 for a detail page.
    pub page: u32,
    pub index: usize,
    pub name: Option<String>,
    pub tier: Tier,
    pub reason: String,
}

impl Skip {
    pub fn new(page: u32, index: usize, name: Option<String>, err: &CrawlError) -> Self {
        Self {
            page,
            index,
            name,
            tier: err.tier(),
            reason: err.to_string(),
        }
    }

    /// An entry whose detail URL was already emitted earlier in the run.
    pub fn duplicate(page: u32, index: usize, name: String, url: &str) -> Self {
        Self {
            page,
            index,
            name: Some(name),
            tier: Tier::Transient,
            reason: format!("duplicate of {url}"),
        }
    }
}

/// Output of a harvest: what was collected, what was skipped, and the
/// fatal error that ended the run early, if any.
#[derive(Debug)]
pub struct Harvest<T> {
    pub items: Vec<T>,
    pub skipped: Vec<Skip>,
    pub fatal: Option<CrawlError>,
}

impl<T> Default for Harvest<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            skipped: Vec::new(),
            fatal: None,
        }
    }
}

impl<T> Harvest<T> {
    pub fn is_complete(&self) -> bool {
        self.fatal.is_none()
    }
}
