//! Process-wide query cache.
//!
//! Maps a canonical [`QueryKey`] to the latest known state of one cacheable
//! read. The correctness core is `ensure_fresh`: concurrent identical
//! fetches are de-duplicated so the fetcher runs at most once per key at a
//! time and every caller observes the same resolved value — no cache
//! stampede. Invalidation marks entries stale without dropping their data;
//! eviction only touches entries that have had zero subscribers for longer
//! than the grace window.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tracing::debug;
use uuid::Uuid;

use pact_common::error::{PactError, PactResult};

/// Canonical identifier for one cacheable read: entity kind plus ordered
/// parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    kind: &'static str,
    params: Vec<String>,
}

impl QueryKey {
    fn new(kind: &'static str, params: Vec<String>) -> Self {
        Self { kind, params }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn communities() -> Self {
        Self::new("communities", vec![])
    }

    pub fn community(id: Uuid) -> Self {
        Self::new("community", vec![id.to_string()])
    }

    pub fn community_members(community_id: Uuid) -> Self {
        Self::new("community_members", vec![community_id.to_string()])
    }

    pub fn user_memberships(user_id: Uuid) -> Self {
        Self::new("user_memberships", vec![user_id.to_string()])
    }

    pub fn messages(community_id: Uuid) -> Self {
        Self::new("messages", vec![community_id.to_string()])
    }

    pub fn progress_logs(member_id: Uuid) -> Self {
        Self::new("progress_logs", vec![member_id.to_string()])
    }

    pub fn wallet_transactions(user_id: Uuid) -> Self {
        Self::new("wallet_transactions", vec![user_id.to_string()])
    }

    pub fn notifications(user_id: Uuid) -> Self {
        Self::new("notifications", vec![user_id.to_string()])
    }

    pub fn user(id: Uuid) -> Self {
        Self::new("user", vec![id.to_string()])
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind)?;
        for param in &self.params {
            write!(f, ":{param}")?;
        }
        Ok(())
    }
}

/// Selects cache entries for invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPredicate {
    /// One exact key.
    Exact(QueryKey),
    /// Every key of a kind, regardless of parameters.
    Kind(&'static str),
}

impl KeyPredicate {
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            Self::Exact(k) => k == key,
            Self::Kind(kind) => *kind == key.kind,
        }
    }
}

/// Lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Notification delivered to entry subscribers.
#[derive(Debug, Clone)]
pub struct CacheUpdate {
    pub key: QueryKey,
    pub change: CacheChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheChange {
    StatusChanged(QueryStatus),
    Invalidated,
}

/// Point-in-time view of one entry.
///
/// `data` is the last successfully fetched value and stays visible through
/// invalidation and refetch. A failed attempt clears it, so stale data is
/// never rendered alongside a newer error.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    pub status: QueryStatus,
    pub data: Option<Value>,
    pub error: Option<Arc<PactError>>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub stale: bool,
    pub subscriber_count: usize,
}

type FetchResult = Result<Value, Arc<PactError>>;

struct CacheEntry {
    key: QueryKey,
    status: QueryStatus,
    data: Option<Value>,
    error: Option<Arc<PactError>>,
    last_fetched_at: Option<DateTime<Utc>>,
    stale: bool,
    subscribers: usize,
    idle_since: Option<Instant>,
    updates: broadcast::Sender<CacheUpdate>,
}

impl CacheEntry {
    fn new(key: QueryKey) -> Self {
        let (updates, _) = broadcast::channel(16);
        Self {
            key,
            status: QueryStatus::Idle,
            data: None,
            error: None,
            last_fetched_at: None,
            stale: false,
            subscribers: 0,
            idle_since: Some(Instant::now()),
            updates,
        }
    }

    fn notify(&self, change: CacheChange) {
        let _ = self.updates.send(CacheUpdate {
            key: self.key.clone(),
            change,
        });
    }

    fn set_status(&mut self, status: QueryStatus) {
        self.status = status;
        self.notify(CacheChange::StatusChanged(status));
    }

    fn apply_success(&mut self, data: Value) {
        self.data = Some(data);
        self.error = None;
        self.stale = false;
        self.last_fetched_at = Some(Utc::now());
        self.set_status(QueryStatus::Success);
    }

    fn apply_error(&mut self, error: Arc<PactError>) {
        // Stale data and a newer error are never shown together.
        self.data = None;
        self.error = Some(error);
        self.last_fetched_at = Some(Utc::now());
        self.set_status(QueryStatus::Error);
    }

    fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            last_fetched_at: self.last_fetched_at,
            stale: self.stale,
            subscriber_count: self.subscribers,
        }
    }
}

struct CacheInner {
    entries: HashMap<QueryKey, CacheEntry>,
    inflight: HashMap<QueryKey, broadcast::Sender<FetchResult>>,
}

/// The shared query cache. Cloning is cheap and every clone observes the
/// same entries.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Mutex<CacheInner>>,
    grace: Duration,
}

impl QueryCache {
    /// `grace` is how long a zero-subscriber entry survives before a sweep
    /// may drop it.
    pub fn new(grace: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                entries: HashMap::new(),
                inflight: HashMap::new(),
            })),
            grace,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state of an entry, synchronously. Never blocks on I/O.
    pub fn read(&self, key: &QueryKey) -> Option<CacheSnapshot> {
        self.lock().entries.get(key).map(CacheEntry::snapshot)
    }

    /// Return fresh data for `key`, fetching at most once.
    ///
    /// A fresh `Success` entry is returned without invoking `fetcher`. If a
    /// fetch for `key` is already in flight the caller joins it and observes
    /// the same eventual result. Otherwise this caller leads: the fetch runs
    /// on a detached task, so dropping any caller mid-await never aborts the
    /// fetch or strands the callers still waiting on it.
    pub async fn ensure_fresh<F, Fut>(&self, key: QueryKey, fetcher: F) -> PactResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PactResult<Value>> + Send + 'static,
    {
        enum Plan {
            Hit(Value),
            Follow(broadcast::Receiver<FetchResult>),
            Lead(broadcast::Receiver<FetchResult>),
        }

        let plan = {
            let mut inner = self.lock();
            if let Some(tx) = inner.inflight.get(&key) {
                Plan::Follow(tx.subscribe())
            } else {
                let entry = inner
                    .entries
                    .entry(key.clone())
                    .or_insert_with(|| CacheEntry::new(key.clone()));
                match (&entry.status, entry.stale, &entry.data) {
                    (QueryStatus::Success, false, Some(data)) => Plan::Hit(data.clone()),
                    _ => {
                        entry.set_status(QueryStatus::Loading);
                        let (tx, rx) = broadcast::channel(1);
                        inner.inflight.insert(key.clone(), tx);
                        Plan::Lead(rx)
                    }
                }
            }
        };

        let mut rx = match plan {
            Plan::Hit(data) => {
                debug!(%key, "cache hit");
                return Ok(data);
            }
            Plan::Follow(rx) => {
                debug!(%key, "joining in-flight fetch");
                rx
            }
            Plan::Lead(rx) => {
                debug!(%key, "fetching");
                let cache = self.clone();
                let fut = fetcher();
                let fetch_key = key.clone();
                tokio::spawn(async move {
                    let result: FetchResult = fut.await.map_err(Arc::new);

                    let mut inner = cache.lock();
                    let tx = inner.inflight.remove(&fetch_key);
                    match inner.entries.get_mut(&fetch_key) {
                        Some(entry) => match &result {
                            Ok(data) => entry.apply_success(data.clone()),
                            Err(e) => entry.apply_error(Arc::clone(e)),
                        },
                        // Evicted while loading with no subscribers left: the
                        // result is discarded, not resurrected.
                        None => debug!(key = %fetch_key, "entry evicted mid-fetch, discarding result"),
                    }
                    drop(inner);

                    if let Some(tx) = tx {
                        let _ = tx.send(result);
                    }
                });
                rx
            }
        };

        match rx.recv().await {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(e)) => Err(PactError::Shared(e)),
            Err(_) => Err(PactError::Internal(anyhow::anyhow!(
                "in-flight fetch for {key} was abandoned"
            ))),
        }
    }

    /// Mark matching entries stale and notify their subscribers. Data is
    /// kept; the next read refetches.
    pub fn invalidate(&self, predicate: &KeyPredicate) -> usize {
        let mut inner = self.lock();
        let mut count = 0;
        for entry in inner.entries.values_mut() {
            if predicate.matches(&entry.key) {
                entry.stale = true;
                entry.notify(CacheChange::Invalidated);
                count += 1;
            }
        }
        if count > 0 {
            debug!(?predicate, count, "invalidated");
        }
        count
    }

    /// Subscribe to updates for `key`. The entry is pinned against eviction
    /// for as long as the subscription is held.
    pub fn subscribe(&self, key: QueryKey) -> CacheSubscription {
        let mut inner = self.lock();
        let entry = inner
            .entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(key.clone()));
        entry.subscribers += 1;
        entry.idle_since = None;
        CacheSubscription {
            key,
            receiver: entry.updates.subscribe(),
            cache: self.clone(),
        }
    }

    /// Drop entries that have had zero subscribers for longer than the
    /// grace window. Subscribed entries are never evicted, however stale.
    pub fn evict_idle(&self) -> usize {
        let grace = self.grace;
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| {
            entry.subscribers > 0
                || entry
                    .idle_since
                    .is_none_or(|since| since.elapsed() < grace)
        });
        let evicted = before - inner.entries.len();
        if evicted > 0 {
            debug!(evicted, "evicted idle cache entries");
        }
        evicted
    }

    /// Spawn a background task sweeping idle entries on an interval.
    pub fn spawn_sweeper(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                cache.evict_idle();
            }
        })
    }

    fn unsubscribe(&self, key: &QueryKey) {
        let mut inner = self.lock();
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.subscribers = entry.subscribers.saturating_sub(1);
            if entry.subscribers == 0 {
                entry.idle_since = Some(Instant::now());
            }
        }
    }
}

/// Live subscription to one cache entry. Dropping it releases the entry for
/// eviction once the grace window elapses.
pub struct CacheSubscription {
    key: QueryKey,
    receiver: broadcast::Receiver<CacheUpdate>,
    cache: QueryCache,
}

impl CacheSubscription {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Await the next update for this entry.
    pub async fn recv(&mut self) -> Result<CacheUpdate, broadcast::error::RecvError> {
        self.receiver.recv().await
    }
}

impl Drop for CacheSubscription {
    fn drop(&mut self) {
        self.cache.unsubscribe(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display_is_canonical() {
        assert_eq!(QueryKey::communities().to_string(), "communities");
        let id = Uuid::parse_str("0192c7a1-9a2b-7c3d-8e4f-5a6b7c8d9e0f").unwrap();
        assert_eq!(
            QueryKey::community_members(id).to_string(),
            format!("community_members:{id}")
        );
    }

    #[test]
    fn test_kind_predicate_ignores_params() {
        let a = QueryKey::messages(Uuid::now_v7());
        let b = QueryKey::messages(Uuid::now_v7());
        let pred = KeyPredicate::Kind("messages");
        assert!(pred.matches(&a));
        assert!(pred.matches(&b));
        assert!(!pred.matches(&QueryKey::communities()));
    }

    #[test]
    fn test_exact_predicate_matches_one_key() {
        let id = Uuid::now_v7();
        let pred = KeyPredicate::Exact(QueryKey::community(id));
        assert!(pred.matches(&QueryKey::community(id)));
        assert!(!pred.matches(&QueryKey::community(Uuid::now_v7())));
    }
}
