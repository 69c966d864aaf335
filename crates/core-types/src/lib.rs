//! Shared primitives for the authorization decision cache and policy facade.

mod action;
mod decision;
mod error;
mod key;

pub use action::{Action, Effect, PermissionFlags};
pub use decision::{ActionPartition, Decision, DecisionRequest, PolicyInfo, SUBJECT_TYPE_USER};
pub use error::EngineError;
pub use key::{CacheKey, ObjectRef, SubjectId};
