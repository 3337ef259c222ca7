//! Query cache behavior: single-flight de-duplication, invalidation,
//! subscription notifications, and grace-window eviction.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::future::join_all;
use serde_json::json;
use tokio::sync::Notify;
use tokio::time::{Duration, sleep};
use uuid::Uuid;

use pact_client::{CacheSubscription, KeyPredicate, QueryCache, QueryKey, QueryStatus};
use pact_common::error::PactError;

fn cache() -> QueryCache {
    QueryCache::new(Duration::from_secs(300))
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_fetches_deduplicated() {
    let cache = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::communities();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = cache.clone();
        let calls = Arc::clone(&calls);
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            cache
                .ensure_fresh(key, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    sleep(Duration::from_millis(50)).await;
                    Ok(json!([{ "name": "Readers" }]))
                })
                .await
        }));
    }

    let results = join_all(handles).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1, "fetcher ran more than once");
    for result in results {
        let value = result.unwrap().unwrap();
        assert_eq!(value, json!([{ "name": "Readers" }]));
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_fetch_error_shared() {
    let cache = cache();
    let key = QueryKey::communities();

    let mut handles = Vec::new();
    for _ in 0..3 {
        let cache = cache.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            cache
                .ensure_fresh(key, move || async move {
                    sleep(Duration::from_millis(50)).await;
                    Err(PactError::Conflict {
                        message: "nope".into(),
                    })
                })
                .await
        }));
    }

    for result in join_all(handles).await {
        let err = result.unwrap().unwrap_err();
        assert_eq!(err.error_code(), "CONFLICT");
    }

    let snapshot = cache.read(&key).unwrap();
    assert_eq!(snapshot.status, QueryStatus::Error);
    assert!(snapshot.data.is_none(), "error entries must not expose data");
    assert!(snapshot.error.is_some());
}

#[tokio::test]
async fn test_fresh_entry_served_without_refetch() {
    let cache = cache();
    let key = QueryKey::communities();
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let calls = Arc::clone(&calls);
        let value = cache
            .ensure_fresh(key.clone(), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!(7))
            })
            .await
            .unwrap();
        assert_eq!(value, json!(7));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_invalidate_marks_stale_and_triggers_refetch() {
    let cache = cache();
    let key = QueryKey::communities();
    let calls = Arc::new(AtomicUsize::new(0));

    let fetch = |calls: Arc<AtomicUsize>| {
        move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!("data"))
        }
    };

    cache.ensure_fresh(key.clone(), fetch(Arc::clone(&calls))).await.unwrap();
    assert_eq!(cache.invalidate(&KeyPredicate::Kind("communities")), 1);

    let snapshot = cache.read(&key).unwrap();
    assert!(snapshot.stale);
    // Invalidation keeps the data; it only marks the entry for refetch.
    assert_eq!(snapshot.data, Some(json!("data")));

    cache.ensure_fresh(key.clone(), fetch(Arc::clone(&calls))).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!cache.read(&key).unwrap().stale);
}

#[tokio::test]
async fn test_subscriber_sees_status_changes_and_invalidation() {
    let cache = cache();
    let key = QueryKey::messages(Uuid::now_v7());
    let mut sub: CacheSubscription = cache.subscribe(key.clone());

    cache
        .ensure_fresh(key.clone(), || async { Ok(json!([])) })
        .await
        .unwrap();

    let first = sub.recv().await.unwrap();
    assert_eq!(
        first.change,
        pact_client::cache::CacheChange::StatusChanged(QueryStatus::Loading)
    );
    let second = sub.recv().await.unwrap();
    assert_eq!(
        second.change,
        pact_client::cache::CacheChange::StatusChanged(QueryStatus::Success)
    );

    cache.invalidate(&KeyPredicate::Exact(key.clone()));
    let third = sub.recv().await.unwrap();
    assert_eq!(third.change, pact_client::cache::CacheChange::Invalidated);
}

#[tokio::test(start_paused = true)]
async fn test_idle_entries_evicted_after_grace() {
    let cache = cache();
    let key = QueryKey::communities();
    cache
        .ensure_fresh(key.clone(), || async { Ok(json!(1)) })
        .await
        .unwrap();

    sleep(Duration::from_secs(301)).await;
    assert_eq!(cache.evict_idle(), 1);
    assert!(cache.read(&key).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_subscribed_entries_never_evicted() {
    let cache = cache();
    let key = QueryKey::communities();
    let sub = cache.subscribe(key.clone());
    cache
        .ensure_fresh(key.clone(), || async { Ok(json!(1)) })
        .await
        .unwrap();
    cache.invalidate(&KeyPredicate::Exact(key.clone()));

    sleep(Duration::from_secs(3600)).await;
    assert_eq!(cache.evict_idle(), 0, "subscribed entry was evicted");

    drop(sub);
    sleep(Duration::from_secs(301)).await;
    assert_eq!(cache.evict_idle(), 1);
}

#[tokio::test]
async fn test_cancelled_caller_leaves_fetch_running() {
    let cache = cache();
    let key = QueryKey::communities();
    let gate = Arc::new(Notify::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let leader = {
        let cache = cache.clone();
        let key = key.clone();
        let gate = Arc::clone(&gate);
        tokio::spawn(async move {
            cache
                .ensure_fresh(key, move || async move {
                    gate.notified().await;
                    Ok(json!("done"))
                })
                .await
        })
    };
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;
    leader.abort();
    let _ = leader.await;

    // A later caller joins the still-running fetch instead of hanging on a
    // sender nobody will ever resolve.
    let second = {
        let cache = cache.clone();
        let key = key.clone();
        let calls = Arc::clone(&calls);
        tokio::spawn(async move {
            cache
                .ensure_fresh(key, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!("other"))
                })
                .await
        })
    };
    tokio::task::yield_now().await;

    gate.notify_one();
    let value = second.await.unwrap().unwrap();
    assert_eq!(value, json!("done"));
    assert_eq!(calls.load(Ordering::SeqCst), 0, "second caller re-ran the fetch");
    assert_eq!(cache.read(&key).unwrap().status, QueryStatus::Success);
}

#[tokio::test]
async fn test_stale_data_still_visible_during_refetch() {
    let cache = cache();
    let key = QueryKey::communities();
    cache
        .ensure_fresh(key.clone(), || async { Ok(json!("v1")) })
        .await
        .unwrap();
    cache.invalidate(&KeyPredicate::Exact(key.clone()));

    let gate = Arc::new(Notify::new());
    let task = {
        let cache = cache.clone();
        let key = key.clone();
        let gate = Arc::clone(&gate);
        tokio::spawn(async move {
            cache
                .ensure_fresh(key, move || async move {
                    gate.notified().await;
                    Ok(json!("v2"))
                })
                .await
        })
    };
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    // The refetch is in flight; the last good value keeps rendering.
    let snapshot = cache.read(&key).unwrap();
    assert_eq!(snapshot.status, QueryStatus::Loading);
    assert_eq!(snapshot.data, Some(json!("v1")));

    gate.notify_one();
    assert_eq!(task.await.unwrap().unwrap(), json!("v2"));
    assert_eq!(cache.read(&key).unwrap().data, Some(json!("v2")));
}

#[tokio::test]
async fn test_result_discarded_when_entry_evicted_mid_fetch() {
    let cache = QueryCache::new(Duration::ZERO);
    let key = QueryKey::communities();
    let gate = Arc::new(Notify::new());

    let task = {
        let cache = cache.clone();
        let key = key.clone();
        let gate = Arc::clone(&gate);
        tokio::spawn(async move {
            cache
                .ensure_fresh(key, move || async move {
                    gate.notified().await;
                    Ok(json!("late"))
                })
                .await
        })
    };

    // Let the leader register its in-flight fetch, then evict the entry.
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;
    assert_eq!(cache.evict_idle(), 1);

    gate.notify_one();
    let value = task.await.unwrap().unwrap();
    // The caller still gets its result; the cache does not resurrect it.
    assert_eq!(value, json!("late"));
    assert!(cache.read(&key).is_none());
}
