//! Listing presenter: wires the filter controller to the fetch orchestrator
//! and keeps the result currently on screen.
//!
//! Fetches run as spawned tasks and report back as [`BrowseEvent`]s. Only the
//! event whose key matches the current filter state is applied; anything
//! older is dropped.

use std::sync::Arc;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::api::PlatformSource;
use crate::debug::{self, cat};
use crate::filter::{FilterController, FilterState};
use crate::query_cache::{CacheKey, PlatformOrchestrator, QueryResult};
use crate::types::{FilterOptions, Platform};

#[derive(Debug, Clone)]
pub enum BrowseEvent {
    Loaded { key: CacheKey, result: QueryResult<Platform> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagerView {
    pub label: String,
    pub prev_enabled: bool,
    pub next_enabled: bool,
}

pub struct Browser<S> {
    filters: FilterController,
    orchestrator: Arc<PlatformOrchestrator<S>>,
    page_size: u32,
    key: CacheKey,
    current: QueryResult<Platform>,
    tx: UnboundedSender<BrowseEvent>,
}

impl<S: PlatformSource> Browser<S> {
    pub fn new(orchestrator: Arc<PlatformOrchestrator<S>>, page_size: u32) -> (Self, UnboundedReceiver<BrowseEvent>) {
        let (tx, rx) = unbounded_channel();
        let filters = FilterController::new();
        let key = filters.state().cache_key();
        let browser = Self {
            filters,
            orchestrator,
            page_size,
            key,
            current: QueryResult::idle(),
            tx,
        };
        (browser, rx)
    }

    pub fn state(&self) -> &FilterState {
        self.filters.state()
    }

    /// Batch several filter changes; call [`Browser::refresh`] afterwards.
    pub fn filters_mut(&mut self) -> &mut FilterController {
        &mut self.filters
    }

    pub fn current_key(&self) -> &CacheKey {
        &self.key
    }

    pub fn result(&self) -> &QueryResult<Platform> {
        &self.current
    }

    /// Categories and tags offered by the server alongside the last page.
    pub fn filter_options(&self) -> FilterOptions {
        self.current
            .meta
            .as_ref()
            .map(|m| m.filters.clone())
            .unwrap_or_default()
    }

    pub fn set_search(&mut self, text: &str) {
        self.filters.set_search(text);
        self.refresh();
    }

    pub fn toggle_category(&mut self, id: i64) {
        self.filters.toggle_category(id);
        self.refresh();
    }

    pub fn toggle_tag(&mut self, id: i64) {
        self.filters.toggle_tag(id);
        self.refresh();
    }

    pub fn clear_all(&mut self) {
        self.filters.clear_all();
        self.refresh();
    }

    pub fn set_page(&mut self, n: u32) {
        self.filters.set_page(n);
        self.refresh();
    }

    pub fn next_page(&mut self) {
        self.filters.next_page();
        self.refresh();
    }

    pub fn prev_page(&mut self) {
        self.filters.prev_page();
        self.refresh();
    }

    /// Resolve the current filter state in the background. The previous
    /// result stays visible, flagged as fetching, until the new one lands.
    pub fn refresh(&mut self) {
        self.key = self.filters.state().cache_key();
        let query = self.filters.state().to_query(self.page_size);

        if self.current.has_results() {
            self.current.is_fetching = true;
        } else {
            self.current = QueryResult::loading();
        }

        let key = self.key.clone();
        let orchestrator = Arc::clone(&self.orchestrator);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = orchestrator.resolve(&key, &query).await;
            let revalidating = result.is_fetching;
            if tx.send(BrowseEvent::Loaded { key: key.clone(), result }).is_err() {
                return;
            }
            if revalidating {
                // The refresh may already have landed; the cache then holds it.
                let settled = match orchestrator.settle(&key).await {
                    Some(result) => Some(result),
                    None => orchestrator.cache().peek(&key).map(|page| QueryResult::ready(page, false)),
                };
                if let Some(result) = settled {
                    let _ = tx.send(BrowseEvent::Loaded { key, result });
                }
            }
        });
    }

    /// Apply an event. Returns false when it belonged to a superseded key.
    pub fn handle_event(&mut self, event: BrowseEvent) -> bool {
        let BrowseEvent::Loaded { key, result } = event;
        if key != self.key {
            debug::log(cat::CACHE, format!("discard stale result for {key}"));
            return false;
        }

        if result.is_error && !result.has_results() && self.current.has_results() {
            self.current.is_fetching = false;
            self.current.is_loading = false;
            self.current.is_error = true;
            self.current.error = result.error;
            return true;
        }

        let pages = result.total_pages();
        let known = result.meta.is_some();
        self.current = result;
        if known && self.filters.observe_total_pages(pages) {
            log::debug!("[browse] page corrected to {}", self.filters.state().page());
            self.refresh();
        }
        true
    }

    /// Drain events until the result on screen is no longer loading.
    pub async fn settle(&mut self, rx: &mut UnboundedReceiver<BrowseEvent>) {
        while self.current.is_loading || self.current.is_fetching {
            match rx.recv().await {
                Some(event) => {
                    self.handle_event(event);
                }
                None => break,
            }
        }
    }

    /// Present only when there is more than one page.
    pub fn pager(&self) -> Option<PagerView> {
        let pages = self.current.total_pages();
        if pages <= 1 {
            return None;
        }
        let page = self.filters.state().page();
        let idle = !self.current.is_fetching;
        Some(PagerView {
            label: format!("{} / {}", page, pages.max(1)),
            prev_enabled: idle && page > 1,
            next_enabled: idle && page < pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PlatformQuery;
    use crate::error::ApiError;
    use crate::query_cache::{FetchPolicy, QueryCache};
    use crate::types::{ListMeta, Page, PaginationMeta};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Pages {
        pages: u32,
        queries: Mutex<Vec<PlatformQuery>>,
    }

    #[async_trait]
    impl PlatformSource for Pages {
        async fn fetch_platforms(&self, query: &PlatformQuery) -> Result<Page<Platform>, ApiError> {
            self.queries.lock().unwrap().push(query.clone());
            tokio::time::sleep(Duration::from_millis(10)).await;
            let data = if query.page <= self.pages {
                vec![Platform {
                    id: query.page as i64,
                    slug: format!("p{}", query.page),
                    name: format!("Platform {}", query.page),
                    ..Default::default()
                }]
            } else {
                Vec::new()
            };
            Ok(Page {
                data,
                meta: Some(ListMeta {
                    pagination: PaginationMeta {
                        page: query.page,
                        page_size: query.page_size,
                        total: self.pages as u64,
                        pages: self.pages,
                    },
                    filters: Default::default(),
                }),
            })
        }
    }

    fn browser(pages: u32) -> (Browser<Pages>, UnboundedReceiver<BrowseEvent>, Arc<Pages>) {
        let source = Arc::new(Pages {
            pages,
            queries: Mutex::new(Vec::new()),
        });
        let orch = Arc::new(PlatformOrchestrator::new(source.clone(), QueryCache::new(), FetchPolicy::default()));
        let (b, rx) = Browser::new(orch, 12);
        (b, rx, source)
    }

    #[tokio::test(start_paused = true)]
    async fn first_load_shows_pager() {
        let (mut b, mut rx, _) = browser(3);
        b.refresh();
        assert!(b.result().is_loading);
        b.settle(&mut rx).await;
        assert_eq!(
            b.pager(),
            Some(PagerView {
                label: "1 / 3".into(),
                prev_enabled: false,
                next_enabled: true,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn previous_page_stays_visible_while_fetching() {
        let (mut b, mut rx, _) = browser(3);
        b.refresh();
        b.settle(&mut rx).await;
        b.next_page();
        assert!(b.result().is_fetching);
        assert!(!b.result().is_loading);
        assert_eq!(b.result().data[0].id, 1);
        let pager = b.pager().unwrap();
        assert!(!pager.next_enabled && !pager.prev_enabled);
        b.settle(&mut rx).await;
        assert_eq!(b.result().data[0].id, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_key_is_discarded() {
        let (mut b, _rx, _) = browser(3);
        let old = b.current_key().clone();
        b.set_search("maps");
        let stale = BrowseEvent::Loaded {
            key: old,
            result: QueryResult::failed(ApiError::Network("late".into())),
        };
        assert!(!b.handle_event(stale));
        assert!(!b.result().is_error);
    }

    #[tokio::test(start_paused = true)]
    async fn page_past_end_is_corrected() {
        let (mut b, mut rx, source) = browser(2);
        b.set_page(5);
        b.settle(&mut rx).await;
        assert_eq!(b.state().page(), 2);
        assert_eq!(b.result().data[0].id, 2);
        let pages: Vec<u32> = source.queries.lock().unwrap().iter().map(|q| q.page).collect();
        assert_eq!(pages, vec![5, 2]);
    }
}
