//! Failure taxonomy for harvesting.
//!
//! Every failure a harvester can observe falls into one of four tiers. The
//! first three are absorbed where they are detected and turn into a
//! skip/continue decision; only [`Tier::SessionFatal`] may end a run.

use serde::Serialize;
use std::time::Duration;

/// How a failure is handled by the component that observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// A rendered node vanished or is not interactable yet. Retry or skip.
    Transient,
    /// An expected state did not appear in time. Skip the item or page.
    NavigationTimeout,
    /// A control is permanently missing. Normal terminal condition.
    StructuralAbsence,
    /// The automation backend is gone. Abort after teardown.
    SessionFatal,
}

/// Errors raised while driving a rendered document.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    /// The addressed node is no longer part of the rendered tree.
    #[error("stale element: {0}")]
    Stale(String),

    /// An expected state did not materialize within its budget.
    #[error("timed out after {}ms waiting for {what}", waited.as_millis())]
    Timeout { what: String, waited: Duration },

    /// An expected control does not exist in the current render.
    #[error("not present: {0}")]
    Absent(String),

    /// The browser could not be started, crashed, or stopped answering.
    #[error("session failure: {0}")]
    Session(String),
}

impl CrawlError {
    pub fn stale(what: impl Into<String>) -> Self {
        Self::Stale(what.into())
    }

    pub fn absent(what: impl Into<String>) -> Self {
        Self::Absent(what.into())
    }

    pub fn session(err: impl std::fmt::Display) -> Self {
        Self::Session(err.to_string())
    }

    pub fn timeout(what: impl Into<String>, waited: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            waited,
        }
    }

    /// The handling tier this error belongs to.
    pub fn tier(&self) -> Tier {
        match self {
            Self::Stale(_) => Tier::Transient,
            Self::Timeout { .. } => Tier::NavigationTimeout,
            Self::Absent(_) => Tier::StructuralAbsence,
            Self::Session(_) => Tier::SessionFatal,
        }
    }

    /// True only for failures that must end the run.
    pub fn is_fatal(&self) -> bool {
        self.tier() == Tier::SessionFatal
    }
}

/// Result alias used by every browser-facing operation.
pub type CrawlResult<T> = std::result::Result<T, CrawlError>;
