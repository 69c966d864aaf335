use async_trait::async_trait;
use authz_core_types::{Decision, DecisionRequest, EngineError, ObjectRef, PolicyInfo};

/// The two remote operations offered by the policy engine.
#[async_trait]
pub trait PolicyEngine: Send + Sync {
    /// One decision per request; correlation is by `(object_id, object_type, action)`.
    async fn validate_decisions(
        &self,
        requests: &[DecisionRequest],
        skip_role_check: bool,
    ) -> Result<Vec<Decision>, EngineError>;

    async fn fetch_policy_detail(&self, object: &ObjectRef) -> Result<PolicyInfo, EngineError>;
}

/// Validate and reject responses that do not answer every request.
pub(crate) async fn validate_checked(
    engine: &dyn PolicyEngine,
    requests: &[DecisionRequest],
    skip_role_check: bool,
) -> Result<Vec<Decision>, EngineError> {
    let decisions = engine.validate_decisions(requests, skip_role_check).await?;
    if decisions.len() != requests.len() {
        return Err(EngineError::IncompleteResponse {
            requested: requests.len(),
            received: decisions.len(),
        });
    }
    Ok(decisions)
}
