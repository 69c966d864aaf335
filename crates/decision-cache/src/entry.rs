use std::collections::BTreeSet;
use std::time::Duration;

use authz_core_types::{Action, ActionPartition, PermissionFlags, PolicyInfo};
use tokio::time::Instant;

/// Value stored for one decision-set slot.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub policy_info: Option<PolicyInfo>,
    pub allowed_actions: BTreeSet<Action>,
    pub denied_actions: BTreeSet<Action>,
    pub timestamp: Instant,
    /// Set on reads while a validation or detail call for the slot is in flight.
    pub loading: bool,
}

impl CacheEntry {
    pub fn new(partition: ActionPartition, policy_info: Option<PolicyInfo>) -> Self {
        Self {
            policy_info,
            allowed_actions: partition.allowed,
            denied_actions: partition.denied,
            timestamp: Instant::now(),
            loading: false,
        }
    }

    pub(crate) fn blank(now: Instant) -> Self {
        Self {
            policy_info: None,
            allowed_actions: BTreeSet::new(),
            denied_actions: BTreeSet::new(),
            timestamp: now,
            loading: false,
        }
    }

    pub fn is_valid_at(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.timestamp) < ttl
    }

    pub fn is_allowed(&self, action: &Action) -> bool {
        self.allowed_actions.contains(action)
    }

    pub fn flags(&self) -> PermissionFlags {
        PermissionFlags::from_allowed(&self.allowed_actions)
    }

    pub fn partition(&self) -> ActionPartition {
        ActionPartition {
            allowed: self.allowed_actions.clone(),
            denied: self.denied_actions.clone(),
        }
    }

    pub(crate) fn apply_partition(&mut self, partition: ActionPartition) {
        self.allowed_actions = partition.allowed;
        self.denied_actions = partition.denied;
    }
}
