//! Scripted in-memory site used to exercise harvesters without a browser.
//!
//! Models the search page (a list frame with paginated entries whose
//! container grows as it is scrolled) and detail pages (a detail frame with
//! a reviews tab, a "more" control that appends batches, and expand
//! controls). List operations only work while the list frame is active, so
//! a harvester that forgets to re-enter it after navigating back fails here
//! the same way it would against the real site.

use super::{Launcher, RenderContext};
use crate::error::{CrawlError, CrawlResult};
use crate::selectors::{Locator, SelectorTable, Target};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SEARCH_URL: &str = "https://map.naver.com/p/search/test";

/// What clicking an entry's name does.
#[derive(Debug, Clone)]
pub enum EntryClick {
    /// The top-level URL changes to this detail URL.
    Navigates(String),
    /// Nothing happens; the URL never reflects a detail page.
    Ignored,
    /// The node is re-rendered away before the click lands.
    Stale,
    /// The URL changes to this detail URL, but history back lands on a
    /// blank page with no list frame.
    Strands(String),
    /// The browser dies.
    Crash,
}

#[derive(Debug, Clone)]
pub struct FakeEntry {
    pub name: String,
    pub category: String,
    pub click: EntryClick,
    /// False when the entry's text nodes detach before they can be read.
    pub readable: bool,
}

impl FakeEntry {
    pub fn new(name: &str, category: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            click: EntryClick::Navigates(url.to_string()),
            readable: true,
        }
    }

    pub fn unreadable(mut self) -> Self {
        self.readable = false;
        self
    }

    pub fn with_click(mut self, click: EntryClick) -> Self {
        self.click = click;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextControl {
    Enabled,
    Disabled,
    Absent,
}

#[derive(Debug, Clone)]
pub struct FakePage {
    pub entries: Vec<FakeEntry>,
    pub next: NextControl,
    /// Container scroll height after 1, 2, 3, ... scrolls. The last value repeats.
    pub heights: Vec<u64>,
}

impl FakePage {
    pub fn new(entries: Vec<FakeEntry>, next: NextControl) -> Self {
        Self {
            entries,
            next,
            heights: vec![1200, 2400, 2400],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeDetail {
    pub has_frame: bool,
    pub has_tab: bool,
    pub reviews: Vec<String>,
    /// Each click on "more" appends the next batch.
    pub more_batches: VecDeque<Vec<String>>,
    pub expand_controls: usize,
    /// Expand controls whose click fails as stale.
    pub failing_expands: HashSet<usize>,
}

impl FakeDetail {
    pub fn with_reviews(reviews: &[&str]) -> Self {
        Self {
            has_frame: true,
            has_tab: true,
            reviews: reviews.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Location {
    Blank,
    Search,
    /// Detail view opened from the list; the list frame stays mounted.
    SearchDetail(String),
    Detail(String),
}

#[derive(Debug)]
struct Sim {
    location: Location,
    history: Vec<Location>,
    page_index: usize,
    scrolls: usize,
    tab_open: bool,
    detail: FakeDetail,
}

/// Counters a test can inspect after a run.
#[derive(Debug, Default)]
pub struct Observed {
    pub entry_clicks: Vec<(usize, usize)>,
    pub pages_visited: Vec<usize>,
    pub expanded: usize,
    pub more_clicks: usize,
}

pub struct FakeContext {
    table: SelectorTable,
    pages: Vec<FakePage>,
    details: HashMap<String, FakeDetail>,
    frame: Option<String>,
    sim: Mutex<Sim>,
    pub observed: Mutex<Observed>,
    pub closed: Arc<AtomicUsize>,
}

impl FakeContext {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            table: SelectorTable::default(),
            pages,
            details: HashMap::new(),
            frame: None,
            sim: Mutex::new(Sim {
                location: Location::Blank,
                history: Vec::new(),
                page_index: 0,
                scrolls: 0,
                tab_open: false,
                detail: FakeDetail::default(),
            }),
            observed: Mutex::new(Observed {
                pages_visited: vec![0],
                ..Observed::default()
            }),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_detail(mut self, url: &str, detail: FakeDetail) -> Self {
        self.details.insert(url.to_string(), detail);
        self
    }

    pub fn table(&self) -> &SelectorTable {
        &self.table
    }

    fn target(&self, locator: &Locator) -> CrawlResult<Target> {
        self.table
            .target_of(locator)
            .ok_or_else(|| CrawlError::absent(format!("unknown locator {locator}")))
    }

    fn in_list(&self, sim: &Sim) -> bool {
        matches!(sim.location, Location::Search | Location::SearchDetail(_))
            && self.frame.as_deref() == Some(self.table.list_frame.as_str())
    }

    fn in_detail(&self, sim: &Sim) -> bool {
        matches!(sim.location, Location::Detail(_))
            && self.frame.as_deref() == Some(self.table.detail_frame.as_str())
    }

    fn entry(&self, sim: &Sim, index: usize) -> CrawlResult<FakeEntry> {
        if !self.in_list(sim) {
            return Err(CrawlError::stale("list frame not active"));
        }
        self.pages
            .get(sim.page_index)
            .and_then(|p| p.entries.get(index))
            .cloned()
            .ok_or_else(|| CrawlError::stale(format!("entry {index}")))
    }
}

#[async_trait]
impl RenderContext for FakeContext {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> CrawlResult<()> {
        self.frame = None;
        let mut sim = self.sim.lock().unwrap();
        let next = if let Some(detail) = self.details.get(url) {
            sim.detail = detail.clone();
            sim.tab_open = false;
            Location::Detail(url.to_string())
        } else if url.contains("/search/") {
            sim.page_index = 0;
            sim.scrolls = 0;
            Location::Search
        } else {
            Location::Blank
        };
        let prev = std::mem::replace(&mut sim.location, next);
        sim.history.push(prev);
        Ok(())
    }

    async fn current_url(&self) -> CrawlResult<String> {
        let sim = self.sim.lock().unwrap();
        Ok(match &sim.location {
            Location::Blank => "about:blank".to_string(),
            Location::Search => SEARCH_URL.to_string(),
            Location::SearchDetail(url) | Location::Detail(url) => url.clone(),
        })
    }

    async fn go_back(&mut self) -> CrawlResult<()> {
        self.frame = None;
        let mut sim = self.sim.lock().unwrap();
        if let Some(prev) = sim.history.pop() {
            sim.location = prev;
        }
        Ok(())
    }

    async fn enter_frame(&mut self, name: &str) -> CrawlResult<bool> {
        let present = {
            let sim = self.sim.lock().unwrap();
            match &sim.location {
                Location::Search | Location::SearchDetail(_) => name == self.table.list_frame,
                Location::Detail(_) => name == self.table.detail_frame && sim.detail.has_frame,
                Location::Blank => false,
            }
        };
        if present {
            self.frame = Some(name.to_string());
        }
        Ok(present)
    }

    async fn exit_to_top(&mut self) -> CrawlResult<()> {
        self.frame = None;
        Ok(())
    }

    fn active_frame(&self) -> Option<&str> {
        self.frame.as_deref()
    }

    async fn count(&self, locator: &Locator) -> CrawlResult<usize> {
        let target = self.target(locator)?;
        let sim = self.sim.lock().unwrap();
        if self.in_list(&sim) {
            let page = self.pages.get(sim.page_index);
            return Ok(match target {
                Target::ListContainer => usize::from(page.is_some()),
                Target::ListEntry => page.map(|p| p.entries.len()).unwrap_or(0),
                Target::NextPage => {
                    usize::from(page.is_some_and(|p| p.next != NextControl::Absent))
                }
                _ => 0,
            });
        }
        if self.in_detail(&sim) {
            let open = sim.tab_open;
            return Ok(match target {
                Target::ReviewsTab => usize::from(sim.detail.has_tab),
                Target::MoreReviews if open => usize::from(!sim.detail.more_batches.is_empty()),
                Target::ReviewExpand if open => sim.detail.expand_controls,
                Target::ReviewBody if open => sim.detail.reviews.len(),
                _ => 0,
            });
        }
        Ok(0)
    }

    async fn texts(&self, locator: &Locator) -> CrawlResult<Vec<String>> {
        let target = self.target(locator)?;
        let sim = self.sim.lock().unwrap();
        if target == Target::ReviewBody && self.in_detail(&sim) && sim.tab_open {
            return Ok(sim.detail.reviews.clone());
        }
        Ok(Vec::new())
    }

    async fn text_at(
        &self,
        locator: &Locator,
        index: usize,
        child: Option<&Locator>,
    ) -> CrawlResult<String> {
        if self.target(locator)? != Target::ListEntry {
            return Err(CrawlError::absent(locator.to_string()));
        }
        let child = child.map(|c| self.target(c)).transpose()?;
        let sim = self.sim.lock().unwrap();
        let entry = self.entry(&sim, index)?;
        if !entry.readable {
            return Err(CrawlError::stale(format!("text of entry {index}")));
        }
        match child {
            Some(Target::EntryName) => Ok(entry.name),
            Some(Target::EntryCategory) => Ok(entry.category),
            _ => Err(CrawlError::absent("entry child")),
        }
    }

    async fn attribute_at(
        &self,
        locator: &Locator,
        _index: usize,
        name: &str,
    ) -> CrawlResult<Option<String>> {
        let target = self.target(locator)?;
        let sim = self.sim.lock().unwrap();
        if target != Target::NextPage || !self.in_list(&sim) {
            return Err(CrawlError::stale(locator.to_string()));
        }
        match self.pages.get(sim.page_index).map(|p| p.next) {
            Some(NextControl::Absent) | None => Err(CrawlError::stale("next page control")),
            Some(next) if name == "aria-disabled" => {
                Ok(Some((next == NextControl::Disabled).to_string()))
            }
            Some(_) => Ok(None),
        }
    }

    async fn click_at(
        &self,
        locator: &Locator,
        index: usize,
        child: Option<&Locator>,
    ) -> CrawlResult<()> {
        let target = self.target(locator)?;
        let child = child.map(|c| self.target(c)).transpose()?;
        let mut sim = self.sim.lock().unwrap();
        let mut observed = self.observed.lock().unwrap();
        match target {
            Target::ListEntry => {
                let entry = self.entry(&sim, index)?;
                if child != Some(Target::EntryName) {
                    return Err(CrawlError::absent("entry child"));
                }
                observed.entry_clicks.push((sim.page_index, index));
                match entry.click {
                    EntryClick::Navigates(url) => {
                        let prev = std::mem::replace(&mut sim.location, Location::SearchDetail(url));
                        sim.history.push(prev);
                        Ok(())
                    }
                    EntryClick::Strands(url) => {
                        sim.location = Location::Detail(url);
                        sim.history.push(Location::Blank);
                        Ok(())
                    }
                    EntryClick::Ignored => Ok(()),
                    EntryClick::Stale => Err(CrawlError::stale(format!("entry {index}"))),
                    EntryClick::Crash => Err(CrawlError::session("browser disconnected")),
                }
            }
            Target::NextPage if self.in_list(&sim) => {
                sim.page_index += 1;
                sim.scrolls = 0;
                observed.pages_visited.push(sim.page_index);
                Ok(())
            }
            Target::ReviewsTab if self.in_detail(&sim) && sim.detail.has_tab => {
                sim.tab_open = true;
                Ok(())
            }
            Target::MoreReviews if self.in_detail(&sim) => {
                match sim.detail.more_batches.pop_front() {
                    Some(batch) => {
                        observed.more_clicks += 1;
                        sim.detail.reviews.extend(batch);
                        Ok(())
                    }
                    None => Err(CrawlError::stale("more reviews control")),
                }
            }
            Target::ReviewExpand if self.in_detail(&sim) => {
                if index >= sim.detail.expand_controls || sim.detail.failing_expands.contains(&index)
                {
                    return Err(CrawlError::stale(format!("expand control {index}")));
                }
                observed.expanded += 1;
                Ok(())
            }
            _ => Err(CrawlError::absent(locator.to_string())),
        }
    }

    async fn scroll_to_bottom(&self, container: Option<&Locator>) -> CrawlResult<()> {
        let target = container.map(|c| self.target(c)).transpose()?;
        let mut sim = self.sim.lock().unwrap();
        if target == Some(Target::ListContainer) && !self.in_list(&sim) {
            return Err(CrawlError::absent("scroll container"));
        }
        sim.scrolls += 1;
        Ok(())
    }

    async fn scroll_height(&self, container: Option<&Locator>) -> CrawlResult<u64> {
        if container.is_none() {
            return Ok(0);
        }
        let sim = self.sim.lock().unwrap();
        let heights = match self.pages.get(sim.page_index) {
            Some(p) if !p.heights.is_empty() => &p.heights,
            _ => return Ok(0),
        };
        if sim.scrolls == 0 {
            return Ok(0);
        }
        Ok(heights[(sim.scrolls - 1).min(heights.len() - 1)])
    }

    async fn close(self: Box<Self>) -> CrawlResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Launcher handing out prepared fakes in order, then failing like a
/// missing browser.
pub struct FakeLauncher {
    contexts: Mutex<VecDeque<FakeContext>>,
    pub launches: AtomicUsize,
    pub closed: Arc<AtomicUsize>,
}

impl FakeLauncher {
    pub fn new(context: FakeContext) -> Self {
        Self::sequence(vec![context])
    }

    /// One fresh context per launch; all share one close counter.
    pub fn sequence(contexts: Vec<FakeContext>) -> Self {
        let closed = Arc::new(AtomicUsize::new(0));
        let contexts = contexts
            .into_iter()
            .map(|mut ctx| {
                ctx.closed = Arc::clone(&closed);
                ctx
            })
            .collect();
        Self {
            contexts: Mutex::new(contexts),
            launches: AtomicUsize::new(0),
            closed,
        }
    }

    pub fn unavailable() -> Self {
        Self::sequence(Vec::new())
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self) -> CrawlResult<Box<dyn RenderContext>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        match self.contexts.lock().unwrap().pop_front() {
            Some(ctx) => Ok(Box::new(ctx)),
            None => Err(CrawlError::session("browser binary not found")),
        }
    }
}
