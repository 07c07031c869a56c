//! List harvester — walk every result page and resolve each entry's detail URL.
//!
//! Entries are always addressed by their index in the current render and
//! re-read right before use. Resolving a detail URL means clicking the
//! entry, waiting for the top-level URL to reflect a place page, then going
//! back and re-entering the list frame before the next entry is touched.

use super::{Event, Observer};
use crate::config::CrawlConfig;
use crate::error::{CrawlError, CrawlResult};
use crate::extraction::loader::{drain, DrainPolicy, ScrollContainer};
use crate::model::{ActiveContext, Harvest, ListingRecord, NavigationState, Skip};
use crate::navigation::{frames, wait};
use crate::renderer::RenderContext;
use crate::stealth::behavior;
use regex::Regex;
use std::collections::HashSet;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Summary fields read from one list entry.
struct Entry {
    name: String,
    category: String,
}

pub struct ListHarvester<'a> {
    config: &'a CrawlConfig,
    detail: Regex,
}

impl<'a> ListHarvester<'a> {
    pub fn new(config: &'a CrawlConfig) -> anyhow::Result<Self> {
        Ok(Self {
            config,
            detail: config.site.detail_regex()?,
        })
    }

    /// Harvest every page reachable from `start` (a search URL).
    ///
    /// Never fails: transient and timeout failures become skips, a missing
    /// or disabled pagination control ends the walk, and a session-fatal
    /// error is returned in [`Harvest::fatal`] next to the records gathered
    /// before it.
    pub async fn harvest_all(
        &self,
        context: &mut dyn RenderContext,
        start: &str,
        observer: &mut dyn Observer,
    ) -> Harvest<ListingRecord> {
        let mut harvest = Harvest::default();
        let mut state = NavigationState::default();

        if let Err(e) = self
            .walk(context, start, observer, &mut harvest, &mut state)
            .await
        {
            if e.is_fatal() {
                error!(page = state.page, "list harvest aborted: {e}");
                observer.on_event(Event::Fatal(&e));
                harvest.fatal = Some(e);
            } else {
                warn!(page = state.page, "list harvest ended early: {e}");
            }
        }

        info!(
            records = harvest.items.len(),
            skipped = harvest.skipped.len(),
            pages = state.page,
            "list harvest finished"
        );
        harvest
    }

    async fn walk(
        &self,
        context: &mut dyn RenderContext,
        start: &str,
        observer: &mut dyn Observer,
        harvest: &mut Harvest<ListingRecord>,
        state: &mut NavigationState,
    ) -> CrawlResult<()> {
        let t = &self.config.timeouts;
        let table = &self.config.site.selectors;
        let limits = &self.config.limits;

        context.navigate(start, t.navigation).await?;
        frames::enter_context(context, &table.list_frame, t.list_attach, t.poll_interval).await?;
        state.context = ActiveContext::Frame(table.list_frame.clone());

        let mut seen = HashSet::new();
        state.page = 1;

        loop {
            observer.on_event(Event::Page { page: state.page });
            wait::until_present(context, &table.list_container, t.container_wait, t.poll_interval)
                .await?;

            let mut reveal = ScrollContainer {
                container: table.list_container.clone(),
            };
            let policy = DrainPolicy {
                max_iterations: limits.max_list_scrolls,
                settle: t.scroll_settle,
            };
            let drained = drain(context, &mut reveal, policy).await?;
            state.last_extent = drained.extent;
            debug!(
                page = state.page,
                rounds = drained.iterations,
                stop = ?drained.stop,
                "list container drained"
            );

            let total = match context.count(&table.list_entry).await {
                Ok(n) => n,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(page = state.page, "could not enumerate entries: {e}");
                    0
                }
            };
            info!(page = state.page, entries = total, "walking result page");

            for index in 0..total {
                self.visit(context, state, index, total, observer, harvest, &mut seen)
                    .await?;
                behavior::pause(t.item_settle, limits.jitter_ms).await;
            }

            if limits.max_pages.is_some_and(|max| state.page >= max) {
                info!(page = state.page, "page limit reached");
                return Ok(());
            }
            if !self.advance(context).await? {
                return Ok(());
            }
            state.page += 1;
            state.last_extent = None;
            sleep(t.pagination_settle).await;
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn visit(
        &self,
        context: &mut dyn RenderContext,
        state: &mut NavigationState,
        index: usize,
        total: usize,
        observer: &mut dyn Observer,
        harvest: &mut Harvest<ListingRecord>,
        seen: &mut HashSet<String>,
    ) -> CrawlResult<()> {
        let entry = match self.read_entry(context, index).await {
            Ok(entry) => entry,
            Err(e) => return self.skip(context, state, index, None, e, observer, harvest).await,
        };
        observer.on_event(Event::Entry {
            page: state.page,
            index,
            total,
            name: &entry.name,
        });

        let url = match self.resolve(context, index).await {
            Ok(url) => url,
            Err(e) => {
                return self
                    .skip(context, state, index, Some(entry.name), e, observer, harvest)
                    .await
            }
        };
        state.context = ActiveContext::Frame(self.config.site.selectors.list_frame.clone());

        if !seen.insert(url.clone()) {
            let skip = Skip::duplicate(state.page, index, entry.name, &url);
            info!(page = skip.page, index, name = ?skip.name, "entry skipped: {}", skip.reason);
            observer.on_event(Event::Skipped(&skip));
            harvest.skipped.push(skip);
            return Ok(());
        }

        let record = ListingRecord {
            sequence_id: harvest.items.len() as u32 + 1,
            display_name: entry.name,
            category: entry.category,
            detail_url: url,
        };
        debug!(id = record.sequence_id, name = %record.display_name, "listing captured");
        observer.on_event(Event::Emitted(&record));
        harvest.items.push(record);
        Ok(())
    }

    async fn read_entry(&self, context: &dyn RenderContext, index: usize) -> CrawlResult<Entry> {
        let table = &self.config.site.selectors;
        let name = context
            .text_at(&table.list_entry, index, Some(&table.entry_name))
            .await?;
        let category = match context
            .text_at(&table.list_entry, index, Some(&table.entry_category))
            .await
        {
            Ok(c) => c,
            Err(CrawlError::Absent(_)) => String::new(),
            Err(e) => return Err(e),
        };
        Ok(Entry {
            name: name.trim().to_string(),
            category: category.trim().to_string(),
        })
    }

    /// Click through to the detail page, capture its URL, come back.
    async fn resolve(&self, context: &mut dyn RenderContext, index: usize) -> CrawlResult<String> {
        let t = &self.config.timeouts;
        let table = &self.config.site.selectors;

        context
            .click_at(&table.list_entry, index, Some(&table.entry_name))
            .await?;
        sleep(t.click_settle).await;
        let url = wait::until_url(context, &self.detail, t.detail_url_wait, t.poll_interval).await?;

        frames::return_to_list(context, &table.list_frame, t.return_attach, t.poll_interval).await?;
        wait::until_present(context, &table.list_container, t.container_wait, t.poll_interval)
            .await?;
        Ok(url)
    }

    /// Record a skipped entry and get back into the list frame.
    ///
    /// Session-fatal errors are handed back untouched.
    #[allow(clippy::too_many_arguments)]
    async fn skip(
        &self,
        context: &mut dyn RenderContext,
        state: &mut NavigationState,
        index: usize,
        name: Option<String>,
        err: CrawlError,
        observer: &mut dyn Observer,
        harvest: &mut Harvest<ListingRecord>,
    ) -> CrawlResult<()> {
        if err.is_fatal() {
            return Err(err);
        }
        let skip = Skip::new(state.page, index, name, &err);
        warn!(
            page = skip.page,
            index,
            name = skip.name.as_deref().unwrap_or("?"),
            tier = ?skip.tier,
            "entry skipped: {}",
            skip.reason
        );
        observer.on_event(Event::Skipped(&skip));
        harvest.skipped.push(skip);

        self.recover(context, state).await
    }

    /// Return to the list from wherever a failed entry left us.
    async fn recover(
        &self,
        context: &mut dyn RenderContext,
        state: &mut NavigationState,
    ) -> CrawlResult<()> {
        let t = &self.config.timeouts;
        let list_frame = &self.config.site.selectors.list_frame;

        let url = context.current_url().await?;
        if self.detail.is_match(&url) {
            frames::return_to_list(context, list_frame, t.return_attach, t.poll_interval).await?;
        } else {
            frames::return_to_top(context).await?;
            state.reset_to_top();
            frames::enter_context(context, list_frame, t.return_attach, t.poll_interval).await?;
        }
        state.context = ActiveContext::Frame(list_frame.clone());
        Ok(())
    }

    /// Click the next-page control. `false` means the walk is complete.
    async fn advance(&self, context: &dyn RenderContext) -> CrawlResult<bool> {
        let next = &self.config.site.selectors.next_page;

        let present = match context.count(next).await {
            Ok(n) => n > 0,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                debug!("next page probe failed: {e}");
                false
            }
        };
        if !present {
            info!("no next page control, harvest complete");
            return Ok(false);
        }

        match context.attribute_at(next, 0, "aria-disabled").await {
            Ok(Some(v)) if v == "true" => {
                info!("next page disabled, harvest complete");
                return Ok(false);
            }
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                info!("next page control went away ({e}), harvest complete");
                return Ok(false);
            }
        }

        match context.click_at(next, 0, None).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("next page click failed, stopping: {e}");
                Ok(false)
            }
        }
    }
}
