use std::sync::Arc;
use std::time::Duration;

use authz_core_types::{Decision, DecisionRequest, EngineError};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use policy_facade::{
    Action, DecisionCache, Effect, FacadeOptions, HttpEngineConfig, HttpPolicyEngine, ObjectRef,
    PolicyEngine, PolicyFacade, PolicyInfo, StaticSubject, SubjectId,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
struct ValidateBody {
    requests: Vec<DecisionRequest>,
    skip_role_check: bool,
}

#[derive(Clone, Default)]
struct Seen {
    skip_role_check: Arc<Mutex<Vec<bool>>>,
    authorization: Arc<Mutex<Vec<String>>>,
}

async fn validate(
    State(seen): State<Seen>,
    Json(body): Json<ValidateBody>,
) -> Json<Vec<Decision>> {
    seen.skip_role_check.lock().push(body.skip_role_check);
    let decisions = body
        .requests
        .into_iter()
        .map(|request| Decision {
            effect: if request.action == Action::Read {
                Effect::Allow
            } else {
                Effect::Deny
            },
            object_id: request.object_id,
            object_type: request.object_type,
            action: request.action,
        })
        .collect();
    Json(decisions)
}

async fn policy(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Path((object_type, object_id)): Path<(String, String)>,
) -> Json<Value> {
    if let Some(value) = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
    {
        seen.authorization.lock().push(value.to_string());
    }
    Json(json!({ "type": object_type, "id": object_id, "rules": ["owner-only"] }))
}

async fn spawn_engine(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{addr}")
}

async fn healthy_engine() -> (String, Seen) {
    let seen = Seen::default();
    let router = Router::new()
        .route("/v1/decisions/validate", post(validate))
        .route("/v1/policies/:object_type/:object_id", get(policy))
        .with_state(seen.clone());
    (spawn_engine(router).await, seen)
}

fn client(base_url: String, bearer_token: Option<&str>) -> HttpPolicyEngine {
    HttpPolicyEngine::new(HttpEngineConfig {
        base_url,
        timeout: Duration::from_secs(5),
        bearer_token: bearer_token.map(str::to_string),
    })
    .expect("engine client")
}

#[tokio::test]
async fn validates_over_http() {
    let (base, seen) = healthy_engine().await;
    let engine = client(base, None);
    let object = ObjectRef::new("d1", "document");
    let subject = SubjectId::new("alice");
    let requests =
        DecisionRequest::for_actions(&[Action::Read, Action::Auth], &object, &subject);

    let decisions = engine
        .validate_decisions(&requests, false)
        .await
        .expect("decisions");

    assert_eq!(decisions.len(), 2);
    assert_eq!(decisions[0].effect, Effect::Allow);
    assert_eq!(decisions[1].action, Action::Auth);
    assert_eq!(decisions[1].effect, Effect::Deny);
    assert_eq!(*seen.skip_role_check.lock(), vec![false]);
}

#[tokio::test]
async fn fetches_detail_with_bearer_token() {
    let (base, seen) = healthy_engine().await;
    let engine = client(base, Some("s3cret"));

    let info = engine
        .fetch_policy_detail(&ObjectRef::new("d 1", "document"))
        .await
        .expect("detail");

    assert_eq!(info.value()["id"], "d 1");
    assert_eq!(info.value()["type"], "document");
    assert_eq!(*seen.authorization.lock(), vec!["Bearer s3cret".to_string()]);
}

#[tokio::test]
async fn error_status_is_surfaced() {
    let router = Router::new().route(
        "/v1/decisions/validate",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
    );
    let engine = client(spawn_engine(router).await, None);
    let requests = DecisionRequest::for_actions(
        &[Action::Read],
        &ObjectRef::new("d1", "document"),
        &SubjectId::new("alice"),
    );

    let err = engine
        .validate_decisions(&requests, true)
        .await
        .expect_err("engine is down");
    assert_eq!(
        err,
        EngineError::Status {
            status: 503,
            body: "maintenance".into()
        }
    );
}

#[tokio::test]
async fn short_response_is_rejected() {
    let router = Router::new().route(
        "/v1/decisions/validate",
        post(|| async { Json(Vec::<Decision>::new()) }),
    );
    let engine = client(spawn_engine(router).await, None);
    let requests = DecisionRequest::for_actions(
        &[Action::Read, Action::Download],
        &ObjectRef::new("d1", "document"),
        &SubjectId::new("alice"),
    );

    let err = engine
        .validate_decisions(&requests, true)
        .await
        .expect_err("incomplete");
    assert_eq!(
        err,
        EngineError::IncompleteResponse {
            requested: 2,
            received: 0
        }
    );
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let router = Router::new().route(
        "/v1/policies/:object_type/:object_id",
        get(|| async { "not json" }),
    );
    let engine = client(spawn_engine(router).await, None);

    let err = engine
        .fetch_policy_detail(&ObjectRef::new("d1", "document"))
        .await
        .expect_err("decode failure");
    assert!(matches!(err, EngineError::Decode(_)));
}

#[tokio::test]
async fn facade_runs_against_http_engine() {
    let (base, _seen) = healthy_engine().await;
    let engine: Arc<dyn PolicyEngine> = Arc::new(client(base, None));
    let facade = PolicyFacade::new(
        DecisionCache::new(),
        engine,
        Arc::new(StaticSubject::new("alice")),
    )
    .with_options(FacadeOptions::default().with_auto_fetch(true));

    let state = facade.bind(ObjectRef::new("d1", "document")).await;

    assert!(state.can_read());
    assert!(!state.can_download());
    assert_eq!(
        state.policy_info,
        Some(PolicyInfo::new(
            json!({ "type": "document", "id": "d1", "rules": ["owner-only"] })
        ))
    );
}
