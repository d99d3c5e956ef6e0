//! In-memory query cache with request coalescing and stale-while-revalidate.
//!
//! A [`QueryCache`] is constructed explicitly and handed to whoever needs it;
//! there is no process-wide instance. Entries live for the lifetime of the
//! cache value. At most one fetch per [`CacheKey`] is in flight at any time:
//! concurrent callers for the same key await the same shared future.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;

use crate::api::{PlatformQuery, PlatformSource};
use crate::debug::{self, cat};
use crate::error::ApiError;
use crate::filter;
use crate::net;
use crate::types::{ListMeta, Page, Platform};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        CacheKey(key.into())
    }

    /// Key for a single-entity view, e.g. `platform/deepl`.
    pub fn detail(kind: &str, slug: &str) -> Self {
        CacheKey(format!("{kind}/{}", urlencoding::encode(slug)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, ApiError>>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Entries older than this are revalidated in the background on a hit.
    pub stale_after: Duration,
    /// Transparent retries for transient failures (0 or 1).
    pub retries: u8,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            stale_after: Duration::ZERO,
            retries: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<T> {
    /// Served from the cache without touching the network.
    Hit { value: T, revalidating: bool },
    /// Nothing cached; this is the outcome of the (possibly shared) fetch.
    Fetched(Result<T, ApiError>),
}

struct Entry<T> {
    value: T,
    fetched_at: Instant,
}

struct Inner<T> {
    entries: HashMap<CacheKey, Entry<T>>,
    in_flight: HashMap<CacheKey, SharedFetch<T>>,
}

pub struct QueryCache<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for QueryCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for QueryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_inner<T>(inner: &Mutex<Inner<T>>) -> MutexGuard<'_, Inner<T>> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Clone + Send + Sync + 'static> QueryCache<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
            })),
        }
    }

    pub fn peek(&self, key: &CacheKey) -> Option<T> {
        lock_inner(&self.inner).entries.get(key).map(|e| e.value.clone())
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        lock_inner(&self.inner).entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        lock_inner(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        lock_inner(&self.inner).in_flight.contains_key(key)
    }

    /// Join the in-flight fetch for `key`, or start one. The shared future
    /// writes the cache and clears its in-flight slot when it completes;
    /// failures leave every existing entry untouched.
    pub fn fetch<F, Fut>(&self, key: &CacheKey, policy: FetchPolicy, fetch: F) -> SharedFetch<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let mut guard = lock_inner(&self.inner);
        if let Some(existing) = guard.in_flight.get(key) {
            debug::log(cat::CACHE, format!("join in-flight {key}"));
            return existing.clone();
        }

        debug::log(cat::CACHE, format!("fetch {key}"));
        let inner = Arc::clone(&self.inner);
        let k = key.clone();
        let task = async move {
            let label = k.to_string();
            let res = net::retry_transient(&label, policy.retries, &fetch).await;
            {
                let mut guard = lock_inner(&inner);
                guard.in_flight.remove(&k);
                match &res {
                    Ok(value) => {
                        guard.entries.insert(
                            k,
                            Entry {
                                value: value.clone(),
                                fetched_at: Instant::now(),
                            },
                        );
                    }
                    Err(e) => log::warn!("[query_cache] {label} failed: {e}"),
                }
            }
            res
        }
        .boxed()
        .shared();

        guard.in_flight.insert(key.clone(), task.clone());
        task
    }

    /// Stale-while-revalidate lookup. A hit never waits on the network; a
    /// stale hit spawns a background refresh through the coalescing path.
    pub async fn resolve<F, Fut>(&self, key: &CacheKey, policy: FetchPolicy, fetch: F) -> Resolved<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let cached = lock_inner(&self.inner)
            .entries
            .get(key)
            .map(|e| (e.value.clone(), e.fetched_at.elapsed() >= policy.stale_after));

        if let Some((value, stale)) = cached {
            let revalidating = if stale {
                debug::log(cat::CACHE, format!("hit (stale) {key}"));
                let refresh = self.fetch(key, policy, fetch);
                tokio::spawn(refresh.map(|_| ()));
                true
            } else {
                debug::log(cat::CACHE, format!("hit {key}"));
                self.is_in_flight(key)
            };
            return Resolved::Hit { value, revalidating };
        }

        Resolved::Fetched(self.fetch(key, policy, fetch).await)
    }

    /// Wait for the in-flight fetch of `key`, if there is one.
    pub async fn settle(&self, key: &CacheKey) -> Option<Result<T, ApiError>> {
        let pending = lock_inner(&self.inner).in_flight.get(key).cloned()?;
        Some(pending.await)
    }
}

/// Snapshot handed to presentation code for one listing key.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
    pub data: Vec<T>,
    pub meta: Option<ListMeta>,
    pub is_loading: bool,
    pub is_fetching: bool,
    pub is_error: bool,
    pub error: Option<ApiError>,
}

impl<T> QueryResult<T> {
    pub fn idle() -> Self {
        Self {
            data: Vec::new(),
            meta: None,
            is_loading: false,
            is_fetching: false,
            is_error: false,
            error: None,
        }
    }

    pub fn loading() -> Self {
        Self {
            is_loading: true,
            is_fetching: true,
            ..Self::idle()
        }
    }

    pub fn ready(page: Page<T>, is_fetching: bool) -> Self {
        Self {
            data: page.data,
            meta: page.meta,
            is_fetching,
            ..Self::idle()
        }
    }

    pub fn failed(error: ApiError) -> Self {
        Self {
            is_error: true,
            error: Some(error),
            ..Self::idle()
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.error.as_ref().is_some_and(ApiError::is_unauthorized)
    }

    pub fn total_pages(&self) -> u32 {
        filter::total_pages(self.meta.as_ref())
    }

    pub fn has_results(&self) -> bool {
        !self.data.is_empty()
    }
}

/// Maps a listing key to cached pages of platforms, fetching through a
/// [`PlatformSource`] on a miss.
pub struct PlatformOrchestrator<S> {
    source: Arc<S>,
    cache: QueryCache<Page<Platform>>,
    policy: FetchPolicy,
}

impl<S: PlatformSource> PlatformOrchestrator<S> {
    pub fn new(source: Arc<S>, cache: QueryCache<Page<Platform>>, policy: FetchPolicy) -> Self {
        Self {
            source,
            cache,
            policy,
        }
    }

    pub fn cache(&self) -> &QueryCache<Page<Platform>> {
        &self.cache
    }

    pub async fn resolve(&self, key: &CacheKey, query: &PlatformQuery) -> QueryResult<Platform> {
        let source = Arc::clone(&self.source);
        let query = query.clone();
        let fetch = move || {
            let source = Arc::clone(&source);
            let query = query.clone();
            async move { source.fetch_platforms(&query).await }
        };

        match self.cache.resolve(key, self.policy, fetch).await {
            Resolved::Hit { value, revalidating } => QueryResult::ready(value, revalidating),
            Resolved::Fetched(Ok(page)) => QueryResult::ready(page, false),
            Resolved::Fetched(Err(e)) => QueryResult::failed(e),
        }
    }

    /// Outcome of a background refresh for `key`, if one is running. A failed
    /// refresh keeps the previously cached page and flags the error.
    pub async fn settle(&self, key: &CacheKey) -> Option<QueryResult<Platform>> {
        let outcome = self.cache.settle(key).await?;
        Some(match outcome {
            Ok(page) => QueryResult::ready(page, false),
            Err(e) => {
                let mut result = self
                    .cache
                    .peek(key)
                    .map(|page| QueryResult::ready(page, false))
                    .unwrap_or_else(QueryResult::idle);
                result.is_error = true;
                result.error = Some(e);
                result
            }
        })
    }
}
