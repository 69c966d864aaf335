//! Consumer-facing authorization facade.
//!
//! A [`PolicyFacade`] is bound to one object for the current subject and
//! answers permission questions through the shared [`DecisionCache`],
//! falling back to the remote [`PolicyEngine`] on a miss.

mod batch;
mod engine;
mod facade;
mod http_transport;
mod notifier;
mod options;
mod subject;

pub use authz_core_types::{Action, Effect, ObjectRef, PolicyInfo, SubjectId};
pub use batch::PartialDecisionResult;
pub use decision_cache::DecisionCache;
pub use engine::PolicyEngine;
pub use facade::{BindingPhase, PolicyFacade, PolicyState};
pub use http_transport::{HttpEngineConfig, HttpPolicyEngine};
pub use notifier::{ErrorNotifier, TracingNotifier};
pub use options::FacadeOptions;
pub use subject::{SessionSubject, StaticSubject, SubjectProvider};
