use authz_core_types::Action;
use serde::{Deserialize, Serialize};

/// Per-facade behaviour switches.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacadeOptions {
    /// Fetch policy detail when a binding initializes.
    pub auto_fetch: bool,
    /// Validate `check_keys` when a binding initializes.
    pub auto_validate: bool,
    pub check_keys: Vec<Action>,
    /// Ask the engine to skip role shortcuts and evaluate raw policy rules.
    pub skip_role_check: bool,
}

impl Default for FacadeOptions {
    fn default() -> Self {
        Self {
            auto_fetch: false,
            auto_validate: true,
            check_keys: Action::canonical(),
            skip_role_check: true,
        }
    }
}

impl FacadeOptions {
    pub fn with_auto_fetch(mut self, enabled: bool) -> Self {
        self.auto_fetch = enabled;
        self
    }

    pub fn with_auto_validate(mut self, enabled: bool) -> Self {
        self.auto_validate = enabled;
        self
    }

    pub fn with_check_keys(mut self, keys: impl IntoIterator<Item = Action>) -> Self {
        self.check_keys = keys.into_iter().collect();
        self
    }

    pub fn with_skip_role_check(mut self, skip: bool) -> Self {
        self.skip_role_check = skip;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_canonical_behaviour() {
        let options = FacadeOptions::default();
        assert!(!options.auto_fetch);
        assert!(options.auto_validate);
        assert!(options.skip_role_check);
        assert_eq!(options.check_keys, Action::canonical());
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let options: FacadeOptions =
            serde_json::from_str(r#"{ "auto_fetch": true, "check_keys": ["read"] }"#).unwrap();
        assert!(options.auto_fetch);
        assert!(options.auto_validate);
        assert_eq!(options.check_keys, vec![Action::Read]);
    }
}
