use std::collections::{BTreeSet, HashMap};

use authz_core_types::{Action, ActionPartition, Decision, ObjectRef, PermissionFlags};
use serde::Serialize;
use tracing::debug;

/// Aggregate answer for one resource of a bulk check.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct PartialDecisionResult {
    pub allowed_actions: BTreeSet<Action>,
    pub denied_actions: BTreeSet<Action>,
    pub can_read: bool,
    pub can_download: bool,
    pub can_auth: bool,
    pub can_allocate: bool,
}

impl From<ActionPartition> for PartialDecisionResult {
    fn from(partition: ActionPartition) -> Self {
        let PermissionFlags {
            can_read,
            can_download,
            can_auth,
            can_allocate,
        } = partition.flags();
        Self {
            allowed_actions: partition.allowed,
            denied_actions: partition.denied,
            can_read,
            can_download,
            can_auth,
            can_allocate,
        }
    }
}

/// Split a flat decision list back per resource id.
///
/// Every requested resource gets an entry, even when the engine said nothing
/// about it. Decisions for unrequested resources or actions are dropped.
/// Resources are keyed by id alone, so the same id under two types shares one
/// entry.
pub(crate) fn regroup(
    resources: &[ObjectRef],
    check_keys: &[Action],
    decisions: &[Decision],
) -> HashMap<String, PartialDecisionResult> {
    let mut partitions: HashMap<String, ActionPartition> = resources
        .iter()
        .map(|resource| (resource.object_id.clone(), ActionPartition::default()))
        .collect();
    if partitions.len() < resources.len() {
        debug!(
            target: "policy-facade",
            resources = resources.len(),
            ids = partitions.len(),
            "batch resources share ids; their verdicts are merged per id"
        );
    }

    for decision in decisions {
        if !check_keys.contains(&decision.action) {
            continue;
        }
        if !resources.iter().any(|resource| decision.concerns(resource)) {
            continue;
        }
        if let Some(partition) = partitions.get_mut(&decision.object_id) {
            partition.record(decision.action.clone(), decision.effect);
        }
    }

    partitions
        .into_iter()
        .map(|(id, partition)| (id, PartialDecisionResult::from(partition)))
        .collect()
}
