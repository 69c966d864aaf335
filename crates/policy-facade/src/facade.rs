use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use authz_core_types::{
    Action, ActionPartition, CacheKey, DecisionRequest, EngineError, ObjectRef, PermissionFlags,
    PolicyInfo, SubjectId,
};
use decision_cache::{CacheEntry, DecisionCache};
use futures::future::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::batch::{self, PartialDecisionResult};
use crate::engine::{validate_checked, PolicyEngine};
use crate::notifier::{ErrorNotifier, TracingNotifier};
use crate::options::FacadeOptions;
use crate::subject::SubjectProvider;

/// Where a facade's bound slot sits in its lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingPhase {
    Uninitialized,
    Checking,
    Ready,
    Stale,
}

/// Snapshot of what a facade currently knows about its bound object.
#[derive(Clone, Debug, Serialize)]
pub struct PolicyState {
    pub object: Option<ObjectRef>,
    pub subject: Option<SubjectId>,
    pub policy_info: Option<PolicyInfo>,
    pub allowed_actions: BTreeSet<Action>,
    pub denied_actions: BTreeSet<Action>,
    pub loading: bool,
    pub phase: BindingPhase,
}

impl PolicyState {
    pub fn flags(&self) -> PermissionFlags {
        PermissionFlags::from_allowed(&self.allowed_actions)
    }

    pub fn can_read(&self) -> bool {
        self.allowed_actions.contains(&Action::Read)
    }

    pub fn can_download(&self) -> bool {
        self.allowed_actions.contains(&Action::Download)
    }

    pub fn can_auth(&self) -> bool {
        self.allowed_actions.contains(&Action::Auth)
    }

    pub fn can_allocate(&self) -> bool {
        self.allowed_actions.contains(&Action::Allocate)
    }

    pub fn is_allowed(&self, action: &Action) -> bool {
        self.allowed_actions.contains(action)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct Binding {
    object: ObjectRef,
    subject: Option<SubjectId>,
}

impl Binding {
    fn key(&self) -> Option<CacheKey> {
        self.subject
            .as_ref()
            .map(|subject| CacheKey::for_object(&self.object, subject))
    }
}

#[derive(Default)]
struct Known {
    policy_info: Option<PolicyInfo>,
    partition: ActionPartition,
    adopted_at: Option<Instant>,
    in_flight: u32,
}

#[derive(Default)]
struct Slot {
    // Bumped on every binding change; results carrying an older value are dropped.
    generation: u64,
    binding: Option<Binding>,
    known: Known,
}

/// A bound request target captured before an engine call.
struct Target {
    generation: u64,
    object: ObjectRef,
    subject: SubjectId,
    key: CacheKey,
}

/// Per-consumer entry point bound to one `(object, subject)` pair.
pub struct PolicyFacade {
    cache: DecisionCache,
    engine: Arc<dyn PolicyEngine>,
    subjects: Arc<dyn SubjectProvider>,
    notifier: Arc<dyn ErrorNotifier>,
    options: FacadeOptions,
    slot: Mutex<Slot>,
}

impl PolicyFacade {
    pub fn new(
        cache: DecisionCache,
        engine: Arc<dyn PolicyEngine>,
        subjects: Arc<dyn SubjectProvider>,
    ) -> Self {
        Self {
            cache,
            engine,
            subjects,
            notifier: Arc::new(TracingNotifier),
            options: FacadeOptions::default(),
            slot: Mutex::new(Slot::default()),
        }
    }

    pub fn with_options(mut self, options: FacadeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ErrorNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn options(&self) -> &FacadeOptions {
        &self.options
    }

    /// Bind to `object` for the current subject.
    ///
    /// Initialization runs only when the `(object, subject)` pair differs from
    /// the previous binding.
    pub async fn bind(&self, object: ObjectRef) -> PolicyState {
        let next = Binding {
            object,
            subject: self.subjects.current_subject(),
        };
        {
            let mut slot = self.slot.lock();
            if slot.binding.as_ref() == Some(&next) {
                drop(slot);
                return self.state();
            }
            slot.generation = slot.generation.wrapping_add(1);
            slot.binding = Some(next.clone());
            slot.known = Known::default();
        }
        debug!(
            target: "policy-facade",
            object = %next.object,
            subject = ?next.subject.as_ref().map(SubjectId::as_str),
            "binding changed"
        );
        self.initialize().await;
        self.state()
    }

    /// Re-read the subject and re-initialize if it changed since the last bind.
    pub async fn sync_subject(&self) -> PolicyState {
        let object = self
            .slot
            .lock()
            .binding
            .as_ref()
            .map(|binding| binding.object.clone());
        match object {
            Some(object) => self.bind(object).await,
            None => self.state(),
        }
    }

    async fn initialize(&self) {
        let Some(target) = self.target() else {
            debug!(target: "policy-facade", "no subject available; staying empty");
            return;
        };
        if let Some(entry) = self.cache.get_cached(&target.key) {
            self.adopt(target.generation, entry);
            return;
        }

        let validate = async {
            if self.options.auto_validate {
                self.validate().await;
            }
        };
        let detail = async {
            if self.options.auto_fetch {
                self.fetch_detail().await;
            }
        };
        futures::join!(validate, detail);
    }

    /// Validate `check_keys` for the bound object through the deduplicated path.
    ///
    /// Returns the partition every joined caller observed, or `None` when no
    /// subject is available or the call failed (the failure is reported to the
    /// notifier and nothing is cached).
    pub async fn validate(&self) -> Option<ActionPartition> {
        let target = self.target()?;
        if self.options.check_keys.is_empty() {
            debug!(target: "policy-facade", "no check keys configured; validation skipped");
            return Some(ActionPartition::default());
        }
        let _in_flight = self.begin(target.generation);

        let engine = Arc::clone(&self.engine);
        let check_keys = self.options.check_keys.clone();
        let skip_role_check = self.options.skip_role_check;
        let requests = DecisionRequest::for_actions(&check_keys, &target.object, &target.subject);
        let object = target.object.clone();
        let call = async move {
            let decisions = validate_checked(engine.as_ref(), &requests, skip_role_check).await?;
            Ok::<_, EngineError>(ActionPartition::from_decisions(
                &decisions,
                &object,
                &check_keys,
            ))
        }
        .boxed();

        let outcome = self
            .cache
            .add_pending_validation(&target.key, call)
            .outcome()
            .await;
        match outcome {
            Ok(partition) => {
                self.settle(&target, |known| {
                    known.partition = partition.clone();
                });
                Some(partition)
            }
            Err(err) => {
                self.fail(&target, "validate", &err);
                None
            }
        }
    }

    /// Fetch policy detail for the bound object through the deduplicated path.
    pub async fn fetch_detail(&self) -> Option<PolicyInfo> {
        let target = self.target()?;
        let _in_flight = self.begin(target.generation);

        let engine = Arc::clone(&self.engine);
        let object = target.object.clone();
        let call = async move { engine.fetch_policy_detail(&object).await }.boxed();

        let outcome = self
            .cache
            .add_pending_detail(&target.key, call)
            .outcome()
            .await;
        match outcome {
            Ok(info) => {
                self.settle(&target, |known| {
                    known.policy_info = Some(info.clone());
                });
                Some(info)
            }
            Err(err) => {
                self.fail(&target, "fetch_detail", &err);
                None
            }
        }
    }

    /// Fresh single-action check that bypasses the cache. Fails closed.
    pub async fn check_specific_action(&self, action: Action) -> bool {
        let Some(target) = self.target() else {
            return false;
        };
        let requests = vec![DecisionRequest::new(
            action.clone(),
            &target.object,
            &target.subject,
        )];
        match validate_checked(
            self.engine.as_ref(),
            &requests,
            self.options.skip_role_check,
        )
        .await
        {
            Ok(decisions) => {
                ActionPartition::from_decisions(&decisions, &target.object, &[action.clone()])
                    .is_allowed(&action)
            }
            Err(err) => {
                self.notifier.notify("check_specific_action", &err);
                false
            }
        }
    }

    /// Drop the bound slot and re-run validation and detail fetch.
    pub async fn refresh(&self) -> PolicyState {
        let Some(target) = self.target() else {
            return self.state();
        };
        self.cache.invalidate(&target.key);
        info!(target: "policy-facade", object = %target.object, "refreshing decisions");
        futures::join!(self.validate(), self.fetch_detail());
        self.state()
    }

    /// One-shot bulk check of `check_keys × resources`, keyed by resource id.
    ///
    /// Neither reads nor writes per-object cache slots. Failures report to the
    /// notifier and yield an empty map. Resources sharing an id under different
    /// types collapse into one entry, with Deny winning across them.
    pub async fn check_batch(
        &self,
        resources: &[ObjectRef],
    ) -> HashMap<String, PartialDecisionResult> {
        if resources.is_empty() || self.options.check_keys.is_empty() {
            return HashMap::new();
        }
        let Some(subject) = self.subjects.current_subject() else {
            debug!(target: "policy-facade", "no subject available; batch skipped");
            return HashMap::new();
        };

        let requests =
            DecisionRequest::cross_product(&self.options.check_keys, resources, &subject);
        match validate_checked(
            self.engine.as_ref(),
            &requests,
            self.options.skip_role_check,
        )
        .await
        {
            Ok(decisions) => batch::regroup(resources, &self.options.check_keys, &decisions),
            Err(err) => {
                self.notifier.notify("check_batch", &err);
                HashMap::new()
            }
        }
    }

    pub fn state(&self) -> PolicyState {
        let slot = self.slot.lock();
        let known = &slot.known;
        let phase = if known.in_flight > 0 {
            BindingPhase::Checking
        } else {
            match known.adopted_at {
                None => BindingPhase::Uninitialized,
                Some(at) if at.elapsed() >= self.cache.ttl() => BindingPhase::Stale,
                Some(_) => BindingPhase::Ready,
            }
        };
        PolicyState {
            object: slot.binding.as_ref().map(|b| b.object.clone()),
            subject: slot.binding.as_ref().and_then(|b| b.subject.clone()),
            policy_info: known.policy_info.clone(),
            allowed_actions: known.partition.allowed.clone(),
            denied_actions: known.partition.denied.clone(),
            loading: known.in_flight > 0,
            phase,
        }
    }

    fn target(&self) -> Option<Target> {
        let slot = self.slot.lock();
        let binding = slot.binding.as_ref()?;
        let key = binding.key()?;
        let subject = binding.subject.clone()?;
        Some(Target {
            generation: slot.generation,
            object: binding.object.clone(),
            subject,
            key,
        })
    }

    fn begin(&self, generation: u64) -> InFlight<'_> {
        let mut slot = self.slot.lock();
        if slot.generation == generation {
            slot.known.in_flight += 1;
        }
        InFlight {
            slot: &self.slot,
            generation,
        }
    }

    fn adopt(&self, generation: u64, entry: CacheEntry) {
        let mut slot = self.slot.lock();
        if slot.generation != generation {
            return;
        }
        slot.known.partition = entry.partition();
        slot.known.policy_info = entry.policy_info;
        slot.known.adopted_at = Some(entry.timestamp);
    }

    /// Apply a successful result if the binding is still the one it was issued for.
    ///
    /// The merged cache entry wins when present; `apply` covers the case where
    /// the slot was cleared while the call was in flight.
    fn settle(&self, target: &Target, apply: impl FnOnce(&mut Known)) {
        let entry = self.cache.get_cached(&target.key);
        let mut slot = self.slot.lock();
        if slot.generation != target.generation {
            debug!(
                target: "policy-facade",
                object = %target.object,
                "discarding result for superseded binding"
            );
            return;
        }
        let known = &mut slot.known;
        match entry {
            Some(entry) => {
                known.partition = entry.partition();
                known.policy_info = entry.policy_info;
                known.adopted_at = Some(entry.timestamp);
            }
            None => {
                apply(known);
                known.adopted_at = Some(Instant::now());
            }
        }
    }

    fn fail(&self, target: &Target, operation: &'static str, err: &EngineError) {
        debug!(target: "policy-facade", object = %target.object, operation, "engine call failed");
        self.notifier.notify(operation, err);
    }
}

/// Holds one unit of `in_flight` for a call; released on drop, including when
/// the awaiting future is cancelled.
struct InFlight<'a> {
    slot: &'a Mutex<Slot>,
    generation: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        if slot.generation == self.generation {
            slot.known.in_flight = slot.known.in_flight.saturating_sub(1);
        }
    }
}
