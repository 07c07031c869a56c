//! Harvesters: the list walk and the per-establishment review pass.

pub mod list;
pub mod reviews;

use crate::error::CrawlError;
use crate::model::{ListingRecord, Skip};

/// Progress notifications emitted while a harvester runs.
#[derive(Debug)]
pub enum Event<'a> {
    /// A result page is about to be walked.
    Page { page: u32 },
    /// An entry is being visited.
    Entry {
        page: u32,
        index: usize,
        total: usize,
        name: &'a str,
    },
    Emitted(&'a ListingRecord),
    Skipped(&'a Skip),
    Fatal(&'a CrawlError),
}

/// Receives harvest events: progress display, run trace, tests.
pub trait Observer: Send {
    fn on_event(&mut self, event: Event<'_>);
}

