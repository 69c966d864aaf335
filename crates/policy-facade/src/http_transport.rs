use std::time::Duration;

use async_trait::async_trait;
use authz_core_types::{Decision, DecisionRequest, EngineError, ObjectRef, PolicyInfo};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::engine::PolicyEngine;

#[derive(Clone, Debug)]
pub struct HttpEngineConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub bearer_token: Option<String>,
}

/// Policy engine reached over HTTP/JSON.
pub struct HttpPolicyEngine {
    client: Client,
    base_url: Url,
    bearer_token: Option<String>,
}

#[derive(Serialize)]
struct ValidateBody<'a> {
    requests: &'a [DecisionRequest],
    skip_role_check: bool,
}

fn map_transport_error(err: reqwest::Error) -> EngineError {
    if err.is_timeout() {
        EngineError::Transport(format!("request timed out: {err}"))
    } else if err.is_decode() {
        EngineError::Decode(err.to_string())
    } else {
        EngineError::Transport(err.to_string())
    }
}

impl HttpPolicyEngine {
    pub fn new(config: HttpEngineConfig) -> Result<Self, EngineError> {
        let base_url = Url::parse(&config.base_url).map_err(|err| {
            EngineError::Internal(format!("invalid engine url {}: {err}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(EngineError::Internal(format!(
                "engine url {} cannot carry a path",
                config.base_url
            )));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| EngineError::Internal(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            base_url,
            bearer_token: config.bearer_token,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, EngineError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<response unavailable>".to_string());
            return Err(EngineError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|err| EngineError::Decode(err.to_string()))
    }
}

#[async_trait]
impl PolicyEngine for HttpPolicyEngine {
    async fn validate_decisions(
        &self,
        requests: &[DecisionRequest],
        skip_role_check: bool,
    ) -> Result<Vec<Decision>, EngineError> {
        let url = self.endpoint(&["v1", "decisions", "validate"]);
        debug!(target: "policy-facade", %url, count = requests.len(), "validate decisions");
        let response = self
            .authorize(self.client.post(url))
            .json(&ValidateBody {
                requests,
                skip_role_check,
            })
            .send()
            .await
            .map_err(map_transport_error)?;
        let decisions: Vec<Decision> = Self::read_json(response).await?;
        if decisions.len() != requests.len() {
            return Err(EngineError::IncompleteResponse {
                requested: requests.len(),
                received: decisions.len(),
            });
        }
        Ok(decisions)
    }

    async fn fetch_policy_detail(&self, object: &ObjectRef) -> Result<PolicyInfo, EngineError> {
        let url = self.endpoint(&[
            "v1",
            "policies",
            object.object_type.as_str(),
            object.object_id.as_str(),
        ]);
        debug!(target: "policy-facade", %url, "fetch policy detail");
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(map_transport_error)?;
        Self::read_json(response).await
    }
}
