//! Process-lifetime store of authorization decisions.
//!
//! Entries expire lazily after [`DECISION_TTL`]; concurrent validation or
//! detail requests for the same [`CacheKey`] collapse into one engine call
//! through the pending-request tables.

mod cache;
mod entry;
mod pending;
mod stats;

pub use authz_core_types::CacheKey;
pub use cache::{CacheEvent, DecisionCache, StoredKind, DECISION_TTL};
pub use entry::CacheEntry;
pub use pending::{CallOutcome, PendingCall};
pub use stats::CacheStats;
