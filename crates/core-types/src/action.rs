use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Named capability checked against the policy engine.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    Read,
    Download,
    Auth,
    Allocate,
    Other(String),
}

impl Action {
    /// Default action set used by validation calls.
    pub const CANONICAL: [Action; 4] = [
        Action::Read,
        Action::Download,
        Action::Auth,
        Action::Allocate,
    ];

    pub fn canonical() -> Vec<Action> {
        Self::CANONICAL.to_vec()
    }

    pub fn as_str(&self) -> &str {
        match self {
            Action::Read => "read",
            Action::Download => "download",
            Action::Auth => "auth",
            Action::Allocate => "allocate",
            Action::Other(name) => name.as_str(),
        }
    }
}

impl From<&str> for Action {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "read" => Action::Read,
            "download" => Action::Download,
            "auth" => Action::Auth,
            "allocate" => Action::Allocate,
            _ => Action::Other(raw.trim().to_string()),
        }
    }
}

impl From<String> for Action {
    fn from(raw: String) -> Self {
        Action::from(raw.as_str())
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict returned by the policy engine for one decision.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn is_allow(self) -> bool {
        matches!(self, Effect::Allow)
    }
}

/// Convenience booleans derived from an allowed-action set.
///
/// Always computed from the set on demand so they cannot drift from it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PermissionFlags {
    pub can_read: bool,
    pub can_download: bool,
    pub can_auth: bool,
    pub can_allocate: bool,
}

impl PermissionFlags {
    pub fn from_allowed(allowed: &BTreeSet<Action>) -> Self {
        Self {
            can_read: allowed.contains(&Action::Read),
            can_download: allowed.contains(&Action::Download),
            can_auth: allowed.contains(&Action::Auth),
            can_allocate: allowed.contains(&Action::Allocate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_and_custom_actions() {
        assert_eq!(Action::from("READ"), Action::Read);
        assert_eq!(Action::from(" allocate "), Action::Allocate);
        assert_eq!(
            Action::from("export"),
            Action::Other("export".to_string())
        );
    }

    #[test]
    fn serializes_as_plain_strings() {
        let json = serde_json::to_string(&vec![Action::Download, Action::Other("share".into())])
            .unwrap();
        assert_eq!(json, r#"["download","share"]"#);
        let effect: Effect = serde_json::from_str(r#""deny""#).unwrap();
        assert_eq!(effect, Effect::Deny);
    }

    #[test]
    fn flags_follow_allowed_set() {
        let allowed: BTreeSet<Action> = [Action::Read, Action::Allocate].into_iter().collect();
        let flags = PermissionFlags::from_allowed(&allowed);
        assert!(flags.can_read);
        assert!(!flags.can_download);
        assert!(!flags.can_auth);
        assert!(flags.can_allocate);
    }
}
