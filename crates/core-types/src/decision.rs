use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::{Action, Effect, PermissionFlags};
use crate::key::{ObjectRef, SubjectId};

/// Subject type sent with every decision request; subjects are always users.
pub const SUBJECT_TYPE_USER: &str = "user";

/// One question put to the policy engine.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub action: Action,
    pub object_id: String,
    pub object_type: String,
    pub subject_id: String,
    pub subject_type: String,
}

impl DecisionRequest {
    pub fn new(action: Action, object: &ObjectRef, subject: &SubjectId) -> Self {
        Self {
            action,
            object_id: object.object_id.clone(),
            object_type: object.object_type.clone(),
            subject_id: subject.0.clone(),
            subject_type: SUBJECT_TYPE_USER.to_string(),
        }
    }

    /// One request per action for a single object.
    pub fn for_actions(actions: &[Action], object: &ObjectRef, subject: &SubjectId) -> Vec<Self> {
        actions
            .iter()
            .map(|action| Self::new(action.clone(), object, subject))
            .collect()
    }

    /// Cross product of `actions × objects`, grouped by object.
    pub fn cross_product(
        actions: &[Action],
        objects: &[ObjectRef],
        subject: &SubjectId,
    ) -> Vec<Self> {
        objects
            .iter()
            .flat_map(|object| Self::for_actions(actions, object, subject))
            .collect()
    }
}

/// One verdict returned by the policy engine.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub object_id: String,
    pub object_type: String,
    pub action: Action,
    pub effect: Effect,
}

impl Decision {
    pub fn concerns(&self, object: &ObjectRef) -> bool {
        self.object_id == object.object_id && self.object_type == object.object_type
    }
}

/// Full policy detail payload for an object. Opaque to the cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyInfo(pub Value);

impl PolicyInfo {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }
}

/// Decisions for one object split by effect.
///
/// `allowed` and `denied` are disjoint: when a response carries both verdicts
/// for the same action the action is recorded as denied.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ActionPartition {
    pub allowed: BTreeSet<Action>,
    pub denied: BTreeSet<Action>,
}

impl ActionPartition {
    /// Keep only decisions for `object` whose action was requested.
    pub fn from_decisions<'a, I>(decisions: I, object: &ObjectRef, requested: &[Action]) -> Self
    where
        I: IntoIterator<Item = &'a Decision>,
    {
        let mut partition = Self::default();
        for decision in decisions {
            if !decision.concerns(object) || !requested.contains(&decision.action) {
                continue;
            }
            partition.record(decision.action.clone(), decision.effect);
        }
        partition
    }

    pub fn record(&mut self, action: Action, effect: Effect) {
        match effect {
            Effect::Allow => {
                if !self.denied.contains(&action) {
                    self.allowed.insert(action);
                }
            }
            Effect::Deny => {
                self.allowed.remove(&action);
                self.denied.insert(action);
            }
        }
    }

    pub fn is_allowed(&self, action: &Action) -> bool {
        self.allowed.contains(action)
    }

    pub fn flags(&self) -> PermissionFlags {
        PermissionFlags::from_allowed(&self.allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(id: &str, action: Action, effect: Effect) -> Decision {
        Decision {
            object_id: id.to_string(),
            object_type: "doc".to_string(),
            action,
            effect,
        }
    }

    #[test]
    fn partition_ignores_other_objects_and_unrequested_actions() {
        let object = ObjectRef::new("a", "doc");
        let decisions = vec![
            decision("a", Action::Read, Effect::Allow),
            decision("b", Action::Download, Effect::Allow),
            decision("a", Action::Auth, Effect::Allow),
            decision("a", Action::Download, Effect::Deny),
        ];
        let partition =
            ActionPartition::from_decisions(&decisions, &object, &[Action::Read, Action::Download]);
        assert_eq!(partition.allowed, [Action::Read].into_iter().collect());
        assert_eq!(partition.denied, [Action::Download].into_iter().collect());
    }

    #[test]
    fn conflicting_verdicts_resolve_to_deny() {
        let object = ObjectRef::new("a", "doc");
        let decisions = vec![
            decision("a", Action::Read, Effect::Deny),
            decision("a", Action::Read, Effect::Allow),
            decision("a", Action::Auth, Effect::Allow),
            decision("a", Action::Auth, Effect::Deny),
        ];
        let partition = ActionPartition::from_decisions(&decisions, &object, &Action::canonical());
        assert!(partition.allowed.is_empty());
        assert_eq!(partition.denied.len(), 2);
    }

    #[test]
    fn cross_product_covers_every_pair() {
        let subject = SubjectId::new("u-1");
        let objects = vec![ObjectRef::new("a", "t1"), ObjectRef::new("b", "t2")];
        let requests =
            DecisionRequest::cross_product(&[Action::Read, Action::Download], &objects, &subject);
        assert_eq!(requests.len(), 4);
        assert!(requests.iter().all(|r| r.subject_type == SUBJECT_TYPE_USER));
        assert_eq!(requests[2].object_id, "b");
        assert_eq!(requests[2].action, Action::Read);
    }
}
