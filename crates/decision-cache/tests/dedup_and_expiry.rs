use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use authz_core_types::{Action, ActionPartition, CacheKey, EngineError, SubjectId};
use decision_cache::{CacheEntry, DecisionCache, DECISION_TTL};
use futures::future::{BoxFuture, FutureExt};
use tokio::sync::Notify;

fn key() -> CacheKey {
    CacheKey::new("report-7", "dataset", &SubjectId::new("alice"))
}

fn read_only() -> ActionPartition {
    let mut partition = ActionPartition::default();
    partition.record(Action::Read, authz_core_types::Effect::Allow);
    partition.record(Action::Download, authz_core_types::Effect::Deny);
    partition
}

fn gated_call(
    calls: Arc<AtomicUsize>,
    gate: Arc<Notify>,
) -> BoxFuture<'static, Result<ActionPartition, EngineError>> {
    async move {
        calls.fetch_add(1, Ordering::SeqCst);
        gate.notified().await;
        Ok(read_only())
    }
    .boxed()
}

#[tokio::test]
async fn concurrent_validations_share_one_call() {
    let cache = DecisionCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());

    let handles: Vec<_> = (0..5)
        .map(|_| cache.add_pending_validation(&key(), gated_call(calls.clone(), gate.clone())))
        .collect();
    assert_eq!(handles.iter().filter(|h| h.issued()).count(), 1);
    assert!(cache.has_pending(&key()));

    gate.notify_one();
    let outcomes = futures::future::join_all(handles.into_iter().map(|h| h.outcome())).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(outcomes.iter().all(|o| o.as_ref() == Ok(&read_only())));
    assert!(!cache.has_pending(&key()));
    assert_eq!(cache.stats().issued_calls, 1);
    assert_eq!(cache.stats().joined_calls, 4);
}

#[tokio::test]
async fn failures_are_not_cached() {
    let cache = DecisionCache::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    let failed = cache
        .add_pending(
            &key(),
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<ActionPartition, _>(EngineError::transport("connection reset"))
            }
            .boxed(),
        )
        .outcome()
        .await;
    assert!(failed.is_err());
    assert!(cache.get_cached(&key()).is_none());
    assert!(!cache.has_pending(&key()));

    let counter = calls.clone();
    let retried = cache.add_pending_validation(
        &key(),
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, EngineError>(read_only())
        }
        .boxed(),
    );
    assert!(retried.issued());
    assert!(retried.outcome().await.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(cache.get_cached(&key()).is_some());
}

#[tokio::test(start_paused = true)]
async fn entry_expires_exactly_at_ttl() {
    let cache = DecisionCache::new();
    cache.put(key(), CacheEntry::new(read_only(), None));

    tokio::time::advance(DECISION_TTL - Duration::from_millis(1)).await;
    let entry = cache.get_cached(&key()).expect("still valid just before ttl");
    assert!(entry.is_allowed(&Action::Read));
    assert!(entry.denied_actions.contains(&Action::Download));

    tokio::time::advance(Duration::from_millis(2)).await;
    assert!(cache.get_cached(&key()).is_none());
}

#[tokio::test]
async fn entry_reports_loading_while_a_call_is_in_flight() {
    let cache = DecisionCache::new();
    cache.put(key(), CacheEntry::new(read_only(), None));

    let gate = Arc::new(Notify::new());
    let call = cache.add_pending_validation(&key(), gated_call(Arc::default(), gate.clone()));
    assert!(cache.get_cached(&key()).unwrap().loading);

    gate.notify_one();
    call.outcome().await.unwrap();
    assert!(!cache.get_cached(&key()).unwrap().loading);
}

#[tokio::test]
async fn invalidate_removes_only_the_target_slot() {
    let cache = DecisionCache::new();
    let other = CacheKey::new("report-8", "dataset", &SubjectId::new("alice"));
    cache.put(key(), CacheEntry::new(read_only(), None));
    cache.put(other.clone(), CacheEntry::new(read_only(), None));

    assert!(cache.invalidate(&key()));
    assert!(!cache.invalidate(&key()));
    assert!(cache.get_cached(&key()).is_none());
    assert!(cache.get_cached(&other).is_some());
}
