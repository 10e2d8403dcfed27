//! Per-key fetch deduplication and stale-while-revalidate caching.
//!
//! [`SingleFlight`] guarantees at most one in-flight computation per key.
//! [`ResourceCache`] builds on it: each [`Fingerprint`] has one cached value,
//! revalidated on demand, on an interval, on focus, or globally.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared, join_all};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::Error;

/// Errors are shared between every caller awaiting the same fetch.
pub type SharedError = Arc<Error>;

type Fetcher<V> = Arc<dyn Fn() -> BoxFuture<'static, Result<V, Error>> + Send + Sync>;
type WeakFetcher<V> = Weak<dyn Fn() -> BoxFuture<'static, Result<V, Error>> + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// At most one in-flight computation per key; concurrent callers share its
/// output.
pub struct SingleFlight<K, V> {
    inflight: Mutex<HashMap<K, Flight<V>>>,
    next_id: AtomicU64,
}

struct Flight<V> {
    id: u64,
    future: Shared<BoxFuture<'static, V>>,
    waiters: usize,
}

/// Releases one waiter of a flight; the last waiter out removes the entry,
/// whether the flight finished or every waiter was cancelled.
struct Waiter<'a, K: Eq + Hash, V> {
    inflight: &'a Mutex<HashMap<K, Flight<V>>>,
    key: K,
    id: u64,
}

impl<K: Eq + Hash, V> Drop for Waiter<'_, K, V> {
    fn drop(&mut self) {
        let mut inflight = lock(self.inflight);
        let Some(flight) = inflight.get_mut(&self.key) else {
            return;
        };
        if flight.id != self.id {
            return;
        }
        flight.waiters -= 1;
        if flight.waiters == 0 {
            inflight.remove(&self.key);
        }
    }
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the flight for `key`, starting it with `start` if none is running.
    ///
    /// `start` is only called when this caller leads the flight. The flight
    /// keeps running while any caller is still awaiting it and is dropped
    /// once every caller has gone.
    pub async fn run<F, Fut>(&self, key: K, start: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let (future, waiter) = {
            let mut inflight = lock(&self.inflight);
            let flight = inflight.entry(key.clone()).or_insert_with(|| Flight {
                id: self.next_id.fetch_add(1, Ordering::Relaxed),
                future: start().boxed().shared(),
                waiters: 0,
            });
            flight.waiters += 1;
            let waiter = Waiter {
                inflight: &self.inflight,
                key,
                id: flight.id,
            };
            (flight.future.clone(), waiter)
        };

        let output = future.await;
        drop(waiter);
        output
    }

    /// Whether a flight for `key` is running.
    #[must_use]
    pub fn in_flight(&self, key: &K) -> bool {
        lock(&self.inflight).contains_key(key)
    }
}

impl<K, V> fmt::Debug for SingleFlight<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleFlight")
            .field("inflight", &lock(&self.inflight).len())
            .finish()
    }
}

/// Cache key: a feature name plus the parameters that distinguish one
/// fetch from another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    pub feature: String,
    pub resource: String,
    pub params: Vec<(String, String)>,
}

impl Fingerprint {
    #[must_use]
    pub fn new(feature: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            resource: resource.into(),
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.feature, self.resource)?;
        for (i, (name, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{name}={value}")?;
        }
        Ok(())
    }
}

/// Revalidation policy of one [`Resource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Background revalidation period. `None` disables the timer.
    pub refresh_interval: Option<Duration>,
    /// Whether [`Resource::on_focus`] revalidates.
    pub revalidate_on_focus: bool,
    /// Cached data younger than this is served by [`Resource::get`]
    /// without a fetch.
    pub dedupe_interval: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            refresh_interval: None,
            revalidate_on_focus: true,
            dedupe_interval: Duration::from_secs(2),
        }
    }
}

impl CacheOptions {
    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    #[must_use]
    pub fn with_revalidate_on_focus(mut self, enabled: bool) -> Self {
        self.revalidate_on_focus = enabled;
        self
    }

    #[must_use]
    pub fn with_dedupe_interval(mut self, interval: Duration) -> Self {
        self.dedupe_interval = interval;
        self
    }
}

struct Entry<V> {
    data: Option<V>,
    updated_at: Option<Instant>,
    error: Option<SharedError>,
}

impl<V> Default for Entry<V> {
    fn default() -> Self {
        Self {
            data: None,
            updated_at: None,
            error: None,
        }
    }
}

struct CacheInner<V> {
    entries: Mutex<HashMap<Fingerprint, Entry<V>>>,
    fetchers: Mutex<HashMap<Fingerprint, WeakFetcher<V>>>,
    flights: SingleFlight<Fingerprint, Result<V, SharedError>>,
}

impl<V: Clone> CacheInner<V> {
    fn commit(&self, key: &Fingerprint, outcome: &Result<V, SharedError>) {
        let mut entries = lock(&self.entries);
        let entry = entries.entry(key.clone()).or_default();
        match outcome {
            Ok(value) => {
                entry.data = Some(value.clone());
                entry.updated_at = Some(Instant::now());
                entry.error = None;
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, stale = entry.data.is_some(), "Revalidation failed, keeping cached data");
                entry.error = Some(Arc::clone(e));
            }
        }
    }
}

/// Shared store of fetched values keyed by [`Fingerprint`].
///
/// Cloning is cheap; clones share the same entries and in-flight fetches.
pub struct ResourceCache<V> {
    inner: Arc<CacheInner<V>>,
}

impl<V> Clone for ResourceCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for ResourceCache<V> {
    fn default() -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(HashMap::new()),
                fetchers: Mutex::new(HashMap::new()),
                flights: SingleFlight::default(),
            }),
        }
    }
}

impl<V> fmt::Debug for ResourceCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCache")
            .field("entries", &lock(&self.inner.entries).len())
            .finish_non_exhaustive()
    }
}

impl<V> ResourceCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `fetcher` to `key`.
    ///
    /// With a refresh interval set, a background task revalidates the key
    /// until the returned [`Resource`] is dropped. The task needs a Tokio
    /// runtime; without one the interval is ignored.
    pub fn resource<F, Fut>(&self, key: Fingerprint, fetcher: F, options: CacheOptions) -> Resource<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, Error>> + Send + 'static,
    {
        let fetcher: Fetcher<V> = Arc::new(move || fetcher().boxed());
        lock(&self.inner.fetchers).insert(key.clone(), Arc::downgrade(&fetcher));

        let interval_task = options
            .refresh_interval
            .and_then(|period| self.spawn_interval(key.clone(), Arc::clone(&fetcher), period));

        Resource {
            cache: self.clone(),
            key,
            fetcher,
            options,
            interval_task,
        }
    }

    fn spawn_interval(
        &self,
        key: Fingerprint,
        fetcher: Fetcher<V>,
        period: Duration,
    ) -> Option<JoinHandle<()>> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(key = %key, "No Tokio runtime, interval revalidation disabled");
            return None;
        };
        let cache = self.clone();
        Some(handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let _ = cache.revalidate(&key, &fetcher).await;
            }
        }))
    }

    /// Run `fetcher` for `key`, joining a fetch already in flight.
    async fn revalidate(&self, key: &Fingerprint, fetcher: &Fetcher<V>) -> Result<V, SharedError> {
        let weak = Arc::downgrade(&self.inner);
        let fetcher = Arc::clone(fetcher);
        let owned_key = key.clone();
        self.inner
            .flights
            .run(key.clone(), move || {
                let fetch = fetcher();
                async move {
                    tracing::debug!(key = %owned_key, "Revalidating");
                    let outcome = fetch.await.map_err(Arc::new);
                    if let Some(inner) = weak.upgrade() {
                        inner.commit(&owned_key, &outcome);
                    }
                    outcome
                }
            })
            .await
    }

    /// Last successfully fetched value for `key`.
    #[must_use]
    pub fn cached(&self, key: &Fingerprint) -> Option<V> {
        lock(&self.inner.entries).get(key).and_then(|e| e.data.clone())
    }

    /// Replace the cached value for `key` without fetching.
    pub fn insert(&self, key: Fingerprint, value: V) {
        self.inner.commit(&key, &Ok(value));
    }

    fn live_fetchers(&self, filter: impl Fn(&Fingerprint) -> bool) -> Vec<(Fingerprint, Fetcher<V>)> {
        let mut fetchers = lock(&self.inner.fetchers);
        fetchers.retain(|_, weak| weak.strong_count() > 0);
        fetchers
            .iter()
            .filter(|(key, _)| filter(key))
            .filter_map(|(key, weak)| Some((key.clone(), weak.upgrade()?)))
            .collect()
    }

    async fn revalidate_matching(&self, filter: impl Fn(&Fingerprint) -> bool) -> usize {
        let targets = self.live_fetchers(filter);
        let count = targets.len();
        join_all(
            targets
                .iter()
                .map(|(key, fetcher)| self.revalidate(key, fetcher)),
        )
        .await;
        count
    }

    /// Revalidate every key that still has a live [`Resource`].
    /// Returns the number of keys revalidated.
    pub async fn revalidate_all(&self) -> usize {
        self.revalidate_matching(|_| true).await
    }

    /// Revalidate the live keys of one feature.
    pub async fn revalidate_feature(&self, feature: &str) -> usize {
        self.revalidate_matching(|key| key.feature == feature).await
    }
}

/// One cache key bound to its fetcher.
pub struct Resource<V> {
    cache: ResourceCache<V>,
    key: Fingerprint,
    fetcher: Fetcher<V>,
    options: CacheOptions,
    interval_task: Option<JoinHandle<()>>,
}

impl<V> Resource<V>
where
    V: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn key(&self) -> &Fingerprint {
        &self.key
    }

    /// Last successfully fetched value.
    #[must_use]
    pub fn data(&self) -> Option<V> {
        self.cache.cached(&self.key)
    }

    /// Error of the most recent fetch, cleared by the next success.
    #[must_use]
    pub fn error(&self) -> Option<SharedError> {
        lock(&self.cache.inner.entries)
            .get(&self.key)
            .and_then(|e| e.error.clone())
    }

    /// Whether a fetch for this key is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.cache.inner.flights.in_flight(&self.key)
    }

    /// Cached value when fresher than the dedupe interval, otherwise a fetch.
    ///
    /// # Errors
    ///
    /// The fetch error, shared with every concurrent caller.
    pub async fn get(&self) -> Result<V, SharedError> {
        let fresh = {
            let entries = lock(&self.cache.inner.entries);
            entries.get(&self.key).and_then(|entry| {
                let updated_at = entry.updated_at?;
                (updated_at.elapsed() < self.options.dedupe_interval)
                    .then(|| entry.data.clone())
                    .flatten()
            })
        };
        match fresh {
            Some(value) => Ok(value),
            None => self.mutate().await,
        }
    }

    /// Revalidate now, regardless of freshness.
    ///
    /// On failure the previous value stays cached.
    ///
    /// # Errors
    ///
    /// The fetch error, shared with every concurrent caller.
    pub async fn mutate(&self) -> Result<V, SharedError> {
        self.cache.revalidate(&self.key, &self.fetcher).await
    }

    /// The host app came back to the foreground. Revalidates when the
    /// options allow it; returns `None` otherwise.
    pub async fn on_focus(&self) -> Option<Result<V, SharedError>> {
        if !self.options.revalidate_on_focus {
            return None;
        }
        Some(self.mutate().await)
    }
}

impl<V> Drop for Resource<V> {
    fn drop(&mut self) {
        if let Some(task) = self.interval_task.take() {
            task.abort();
        }
    }
}

impl<V> fmt::Debug for Resource<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("key", &self.key)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
