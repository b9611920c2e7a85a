//! Progressive search over cursor-paginated listings
//!
//! The backend's `q` filter only sees raw columns, so predicates over
//! derived display data (visa labels, assembled names, formatted
//! dates) are evaluated client-side. The scanner walks pages in a
//! cooperative background task and accumulates matches.
//!
//! Starting a new scan is the only cancellation mechanism: it bumps a
//! generation counter, and every state mutation first re-checks the
//! captured generation under the lock. A superseded scan's in-flight
//! fetch still completes, but its result is discarded, never applied.

use crate::error::Result;
use parking_lot::RwLock;
use pd_common::{Page, PagedRecord};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use async_trait::async_trait;

/// A pageable, query-narrowable source of records.
///
/// `query` is forwarded to the backend for whatever coarse narrowing
/// it supports; the scanner's predicate remains authoritative.
#[async_trait]
pub trait PageSource<T>: Send + Sync {
    async fn fetch_page(&self, query: &str, take: usize, cursor: Option<&str>)
        -> Result<Page<T>>;
}

/// Client-side filter applied to every record.
pub type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

struct ScanState<T> {
    query: String,
    predicate: Option<Predicate<T>>,
    matched: Vec<T>,
    seen: HashSet<i64>,
    cursor: Option<String>,
    running: bool,
    generation: u64,
    pages_fetched: usize,
}

impl<T> ScanState<T> {
    fn new() -> Self {
        Self {
            query: String::new(),
            predicate: None,
            matched: Vec::new(),
            seen: HashSet::new(),
            cursor: None,
            running: false,
            generation: 0,
            pages_fetched: 0,
        }
    }

    fn accepts(&self, item: &T) -> bool {
        self.predicate.as_ref().map_or(true, |p| p(item))
    }
}

/// Progressive scanner over one listing endpoint.
///
/// Matches accumulate in discovery order. Within a scan, pages are
/// fetched strictly sequentially, so at most one request is in flight
/// per scanner.
#[derive(Clone)]
pub struct SearchScanner<T> {
    source: Arc<dyn PageSource<T>>,
    state: Arc<RwLock<ScanState<T>>>,
    page_size: usize,
    max_pages: usize,
}

impl<T> SearchScanner<T>
where
    T: PagedRecord + Clone + Send + Sync + 'static,
{
    pub fn new(source: Arc<dyn PageSource<T>>, page_size: usize, max_pages: usize) -> Self {
        Self {
            source,
            state: Arc::new(RwLock::new(ScanState::new())),
            page_size,
            max_pages,
        }
    }

    /// Seed a new scan with an already-fetched first page and spawn
    /// the continuation loop. Any previous scan is superseded.
    ///
    /// The returned handle completes when the scan stops for any
    /// reason; dropping it detaches the scan.
    pub fn start_scan(
        &self,
        query: impl Into<String>,
        predicate: Predicate<T>,
        first_page: Page<T>,
    ) -> JoinHandle<()> {
        let query = query.into();
        let generation = self.install(query.clone(), Some(predicate.clone()), first_page, true);
        debug!(generation, query = %query, "Starting progressive scan");

        let source = self.source.clone();
        let state = self.state.clone();
        let page_size = self.page_size;
        let max_pages = self.max_pages;
        tokio::spawn(async move {
            Self::run(source, state, predicate, query, page_size, max_pages, generation).await;
        })
    }

    /// Install a first page without spawning the continuation loop,
    /// for manual pagination via [`load_more`](SearchScanner::load_more).
    pub fn seed(
        &self,
        query: impl Into<String>,
        predicate: Option<Predicate<T>>,
        first_page: Page<T>,
    ) {
        self.install(query.into(), predicate, first_page, false);
    }

    /// Fetch exactly one page at the current cursor and append the
    /// records the active predicate accepts. Returns how many were
    /// appended; `Ok(0)` when there is no further page.
    pub async fn load_more(&self) -> Result<usize> {
        let (generation, query, cursor) = {
            let state = self.state.read();
            let Some(cursor) = state.cursor.clone() else {
                return Ok(0);
            };
            (state.generation, state.query.clone(), cursor)
        };

        let page = self
            .source
            .fetch_page(&query, self.page_size, Some(&cursor))
            .await?;

        let mut state = self.state.write();
        if state.generation != generation {
            // Superseded while the page was in flight.
            return Ok(0);
        }
        state.pages_fetched += 1;
        let before = state.matched.len();
        for item in page.items {
            if !state.accepts(&item) {
                continue;
            }
            if !state.seen.insert(item.record_id()) {
                continue;
            }
            state.matched.push(item);
        }
        state.cursor = page.next_cursor;
        Ok(state.matched.len() - before)
    }

    /// Clear results and supersede any in-flight scan.
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.generation += 1;
        state.query.clear();
        state.predicate = None;
        state.matched.clear();
        state.seen.clear();
        state.cursor = None;
        state.running = false;
        state.pages_fetched = 0;
    }

    /// Matches accumulated so far, in discovery order.
    pub fn matches(&self) -> Vec<T> {
        self.state.read().matched.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.read().running
    }

    pub fn cursor(&self) -> Option<String> {
        self.state.read().cursor.clone()
    }

    pub fn query(&self) -> String {
        self.state.read().query.clone()
    }

    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    fn install(
        &self,
        query: String,
        predicate: Option<Predicate<T>>,
        first_page: Page<T>,
        running: bool,
    ) -> u64 {
        let mut matched = Vec::new();
        let mut seen = HashSet::new();
        for item in first_page.items {
            if let Some(p) = &predicate {
                if !p(&item) {
                    continue;
                }
            }
            if !seen.insert(item.record_id()) {
                continue;
            }
            matched.push(item);
        }

        let mut state = self.state.write();
        state.generation += 1;
        state.query = query;
        state.predicate = predicate;
        state.matched = matched;
        state.seen = seen;
        state.cursor = first_page.next_cursor;
        state.running = running;
        state.pages_fetched = 1;
        state.generation
    }

    async fn run(
        source: Arc<dyn PageSource<T>>,
        state: Arc<RwLock<ScanState<T>>>,
        predicate: Predicate<T>,
        query: String,
        page_size: usize,
        max_pages: usize,
        generation: u64,
    ) {
        loop {
            let cursor = {
                let mut guard = state.write();
                if guard.generation != generation {
                    debug!(generation, "Scan superseded");
                    return;
                }
                let Some(cursor) = guard.cursor.clone() else {
                    guard.running = false;
                    debug!(
                        generation,
                        matches = guard.matched.len(),
                        pages = guard.pages_fetched,
                        "Scan exhausted the source"
                    );
                    return;
                };
                if guard.pages_fetched >= max_pages {
                    guard.running = false;
                    debug!(generation, pages = guard.pages_fetched, "Scan stopped at the page ceiling");
                    return;
                }
                cursor
            };

            let page = match source.fetch_page(&query, page_size, Some(&cursor)).await {
                Ok(page) => page,
                Err(e) => {
                    let mut guard = state.write();
                    if guard.generation == generation {
                        guard.running = false;
                    }
                    warn!(generation, error = %e, "Scan page fetch failed, keeping partial results");
                    return;
                }
            };

            let mut guard = state.write();
            if guard.generation != generation {
                debug!(generation, "Scan superseded, discarding fetched page");
                return;
            }
            guard.pages_fetched += 1;
            for item in page.items {
                if !predicate(&item) {
                    continue;
                }
                if !guard.seen.insert(item.record_id()) {
                    continue;
                }
                guard.matched.push(item);
            }
            guard.cursor = page.next_cursor;
        }
    }
}
