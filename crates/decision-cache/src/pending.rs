use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use authz_core_types::{CacheKey, EngineError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::runtime::Handle;

pub type CallOutcome<T> = Result<T, EngineError>;

type SharedCall<T> = Shared<BoxFuture<'static, CallOutcome<T>>>;

struct Slot<T>
where
    T: Clone + Send + Sync + 'static,
{
    id: u64,
    call: SharedCall<T>,
}

/// In-flight calls keyed by cache slot. At most one per key.
pub(crate) struct PendingTable<T>
where
    T: Clone + Send + Sync + 'static,
{
    slots: Arc<DashMap<CacheKey, Slot<T>>>,
    next_id: AtomicU64,
}

impl<T> PendingTable<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn contains(&self, key: &CacheKey) -> bool {
        self.slots.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn clear(&self) {
        self.slots.clear();
    }

    /// Attach to the call in flight for `key`, or register `call` as the new one.
    ///
    /// `call` is dropped unpolled when an existing call is joined. A newly
    /// registered call is driven on the current runtime so it settles and
    /// leaves the table even if every awaiting caller goes away.
    pub(crate) fn join_or_insert(
        &self,
        key: &CacheKey,
        call: BoxFuture<'static, CallOutcome<T>>,
    ) -> PendingCall<T> {
        let (shared, issued) = match self.slots.entry(key.clone()) {
            Entry::Occupied(slot) => (slot.get().call.clone(), false),
            Entry::Vacant(vacant) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let slots = Arc::clone(&self.slots);
                let owned_key = key.clone();
                let shared = async move {
                    let outcome = call.await;
                    slots.remove_if(&owned_key, |_, slot| slot.id == id);
                    outcome
                }
                .boxed()
                .shared();
                vacant.insert(Slot {
                    id,
                    call: shared.clone(),
                });
                (shared, true)
            }
        };

        if issued {
            if let Ok(handle) = Handle::try_current() {
                handle.spawn(shared.clone());
            }
        }

        PendingCall {
            call: shared,
            issued,
        }
    }
}

/// Handle on a deduplicated call. Every holder observes the same outcome.
pub struct PendingCall<T>
where
    T: Clone + Send + Sync + 'static,
{
    call: SharedCall<T>,
    issued: bool,
}

impl<T> PendingCall<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// `true` when this handle registered a new call, `false` when it joined one.
    pub fn issued(&self) -> bool {
        self.issued
    }

    pub async fn outcome(self) -> CallOutcome<T> {
        self.call.await
    }
}
