use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use authz_core_types::{ActionPartition, CacheKey, PolicyInfo};
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

use crate::entry::CacheEntry;
use crate::pending::{CallOutcome, PendingCall, PendingTable};
use crate::stats::{CacheStats, Counters};

/// How long a stored decision set stays valid.
pub const DECISION_TTL: Duration = Duration::from_secs(5 * 60);

const EVENT_CAPACITY: usize = 128;

/// Which half of a slot a write touched.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StoredKind {
    Decisions,
    Detail,
    Entry,
}

/// Change notification published to [`DecisionCache::subscribe`] receivers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CacheEvent {
    Stored { key: CacheKey, kind: StoredKind },
    Invalidated { key: CacheKey },
    Cleared,
}

/// Shared decision store. Cloning yields another handle on the same store.
#[derive(Clone)]
pub struct DecisionCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    entries: DashMap<CacheKey, CacheEntry>,
    validations: PendingTable<ActionPartition>,
    details: PendingTable<PolicyInfo>,
    ttl: Duration,
    // Bumped by `clear_all`; calls registered under an older epoch do not write.
    epoch: AtomicU64,
    counters: Counters,
    events: broadcast::Sender<CacheEvent>,
}

impl Default for DecisionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionCache {
    pub fn new() -> Self {
        Self::with_ttl(DECISION_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(CacheInner {
                entries: DashMap::new(),
                validations: PendingTable::new(),
                details: PendingTable::new(),
                ttl,
                epoch: AtomicU64::new(0),
                counters: Counters::default(),
                events,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }

    /// Valid entry for `key`, if any. Stale entries read as absent but stay stored.
    pub fn get_cached(&self, key: &CacheKey) -> Option<CacheEntry> {
        let now = Instant::now();
        let mut entry = {
            let Some(slot) = self.inner.entries.get(key) else {
                self.inner.counters.record_miss();
                return None;
            };
            if !slot.is_valid_at(now, self.inner.ttl) {
                self.inner.counters.record_stale();
                debug!(target: "decision-cache", key = %key, "stale entry read as absent");
                return None;
            }
            slot.value().clone()
        };
        entry.loading = self.has_pending(key);
        self.inner.counters.record_hit();
        Some(entry)
    }

    /// Unconditional overwrite; the stored copy is stamped with the current time.
    pub fn put(&self, key: CacheKey, mut entry: CacheEntry) {
        entry.timestamp = Instant::now();
        entry.loading = false;
        self.inner.entries.insert(key.clone(), entry);
        self.inner.stored(key, StoredKind::Entry);
    }

    pub fn has_pending(&self, key: &CacheKey) -> bool {
        self.has_pending_validation(key) || self.has_pending_detail(key)
    }

    pub fn has_pending_validation(&self, key: &CacheKey) -> bool {
        self.inner.validations.contains(key)
    }

    pub fn has_pending_detail(&self, key: &CacheKey) -> bool {
        self.inner.details.contains(key)
    }

    /// Shorthand for [`DecisionCache::add_pending_validation`].
    pub fn add_pending(
        &self,
        key: &CacheKey,
        call: BoxFuture<'static, CallOutcome<ActionPartition>>,
    ) -> PendingCall<ActionPartition> {
        self.add_pending_validation(key, call)
    }

    /// Register a validation call for `key`, or join the one already in flight.
    ///
    /// On success the partition is merged into the slot before the pending
    /// registration is released, keeping any valid `policy_info`. Failures
    /// write nothing.
    pub fn add_pending_validation(
        &self,
        key: &CacheKey,
        call: BoxFuture<'static, CallOutcome<ActionPartition>>,
    ) -> PendingCall<ActionPartition> {
        let inner = Arc::clone(&self.inner);
        let owned_key = key.clone();
        let epoch = self.inner.epoch.load(Ordering::Acquire);
        let settle = async move {
            let outcome = call.await;
            match &outcome {
                Ok(partition) => inner.merge_partition(&owned_key, partition.clone(), epoch),
                Err(err) => debug!(
                    target: "decision-cache",
                    key = %owned_key,
                    error = %err,
                    "validation failed; nothing cached"
                ),
            }
            outcome
        }
        .boxed();

        let pending = self.inner.validations.join_or_insert(key, settle);
        self.inner.record_registration(key, "validate", pending.issued());
        pending
    }

    /// Register a policy-detail call for `key`, or join the one already in flight.
    ///
    /// On success the detail replaces `policy_info` and leaves valid action
    /// sets untouched.
    pub fn add_pending_detail(
        &self,
        key: &CacheKey,
        call: BoxFuture<'static, CallOutcome<PolicyInfo>>,
    ) -> PendingCall<PolicyInfo> {
        let inner = Arc::clone(&self.inner);
        let owned_key = key.clone();
        let epoch = self.inner.epoch.load(Ordering::Acquire);
        let settle = async move {
            let outcome = call.await;
            match &outcome {
                Ok(info) => inner.merge_detail(&owned_key, info.clone(), epoch),
                Err(err) => debug!(
                    target: "decision-cache",
                    key = %owned_key,
                    error = %err,
                    "detail fetch failed; nothing cached"
                ),
            }
            outcome
        }
        .boxed();

        let pending = self.inner.details.join_or_insert(key, settle);
        self.inner.record_registration(key, "detail", pending.issued());
        pending
    }

    /// Drop the slot for `key`. Returns whether an entry was present.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let removed = self.inner.entries.remove(key).is_some();
        self.inner.counters.record_invalidation();
        self.inner.publish(CacheEvent::Invalidated { key: key.clone() });
        removed
    }

    /// Drop every entry and forget in-flight calls; their late results are discarded.
    pub fn clear_all(&self) {
        self.inner.epoch.fetch_add(1, Ordering::AcqRel);
        self.inner.entries.clear();
        self.inner.validations.clear();
        self.inner.details.clear();
        debug!(target: "decision-cache", "cache cleared");
        self.inner.publish(CacheEvent::Cleared);
    }

    /// Remove stale entries now. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let ttl = self.inner.ttl;
        let before = self.inner.entries.len();
        self.inner
            .entries
            .retain(|_, entry| entry.is_valid_at(now, ttl));
        before.saturating_sub(self.inner.entries.len())
    }

    /// Number of stored slots, stale ones included.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.validations.len() + self.inner.details.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.counters.snapshot()
    }
}

impl CacheInner {
    fn merge_partition(&self, key: &CacheKey, partition: ActionPartition, epoch: u64) {
        if !self.is_current(epoch) {
            debug!(target: "decision-cache", key = %key, "discarding validation from a cleared epoch");
            return;
        }
        let now = Instant::now();
        {
            let mut slot = self
                .entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::blank(now));
            if !slot.is_valid_at(now, self.ttl) {
                slot.policy_info = None;
            }
            slot.apply_partition(partition);
            slot.timestamp = now;
        }
        self.stored(key.clone(), StoredKind::Decisions);
    }

    fn merge_detail(&self, key: &CacheKey, info: PolicyInfo, epoch: u64) {
        if !self.is_current(epoch) {
            debug!(target: "decision-cache", key = %key, "discarding detail from a cleared epoch");
            return;
        }
        let now = Instant::now();
        {
            let mut slot = self
                .entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::blank(now));
            if !slot.is_valid_at(now, self.ttl) {
                slot.apply_partition(ActionPartition::default());
            }
            slot.policy_info = Some(info);
            slot.timestamp = now;
        }
        self.stored(key.clone(), StoredKind::Detail);
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::Acquire) == epoch
    }

    fn stored(&self, key: CacheKey, kind: StoredKind) {
        self.counters.record_stored();
        self.publish(CacheEvent::Stored { key, kind });
    }

    fn record_registration(&self, key: &CacheKey, call: &'static str, issued: bool) {
        self.counters.record_call(issued);
        if issued {
            debug!(target: "decision-cache", key = %key, call, "issued engine call");
        } else {
            debug!(target: "decision-cache", key = %key, call, "joined in-flight engine call");
        }
    }

    fn publish(&self, event: CacheEvent) {
        if self.events.send(event).is_err() {
            debug!(target: "decision-cache", "no cache event subscribers");
        }
    }
}
