//! HTTP webhook surface for the diagnostic agent.
//!
//! Thin dispatch layer: each route deserializes a JSON body, calls the
//! corresponding `PollPort`/`ManagementPort` method, and serializes the
//! result back. No business logic lives here.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rounds_core::{DiagnosticError, ManagementPort, PollPort, SignatureStatus};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;

const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
struct AppState {
    poll: Arc<dyn PollPort>,
    management: Arc<dyn ManagementPort>,
    api_key: Option<Arc<str>>,
}

/// Build the webhook router. `api_key`, when set, requires every request
/// (except `/health`) to carry `Authorization: Bearer <key>`.
pub fn router(
    poll: Arc<dyn PollPort>,
    management: Arc<dyn ManagementPort>,
    api_key: Option<String>,
) -> Router {
    let state = AppState {
        poll,
        management,
        api_key: api_key.map(Arc::from),
    };

    let protected = Router::new()
        .route("/api/poll", post(handle_poll))
        .route("/api/investigate", post(handle_investigate))
        .route("/api/mute", post(handle_mute))
        .route("/api/resolve", post(handle_resolve))
        .route("/api/retriage", post(handle_retriage))
        .route("/api/reinvestigate", post(handle_reinvestigate))
        .route("/api/details", post(handle_details))
        .route("/api/list", post(handle_list))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(handle_health))
        .merge(protected)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };

    let supplied = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match supplied {
        Some(key) if key == expected => next.run(request).await,
        _ => ErrorBody::new("missing or invalid bearer token").into_response(StatusCode::UNAUTHORIZED),
    }
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn handle_poll(State(state): State<AppState>) -> Response {
    respond(state.poll.execute_poll_cycle().await)
}

async fn handle_investigate(State(state): State<AppState>) -> Response {
    respond(state.poll.execute_investigation_cycle().await)
}

#[derive(Deserialize)]
struct MuteRequest {
    signature_id: Uuid,
    reason: Option<String>,
}

async fn handle_mute(State(state): State<AppState>, body: Bytes) -> Response {
    let req: MuteRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    respond(state.management.mute(req.signature_id, req.reason).await)
}

#[derive(Deserialize)]
struct ResolveRequest {
    signature_id: Uuid,
    fix_applied: Option<String>,
}

async fn handle_resolve(State(state): State<AppState>, body: Bytes) -> Response {
    let req: ResolveRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    respond(
        state
            .management
            .resolve(req.signature_id, req.fix_applied)
            .await,
    )
}

#[derive(Deserialize)]
struct SignatureIdRequest {
    signature_id: Uuid,
}

async fn handle_retriage(State(state): State<AppState>, body: Bytes) -> Response {
    let req: SignatureIdRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    respond(state.management.retriage(req.signature_id).await)
}

async fn handle_reinvestigate(State(state): State<AppState>, body: Bytes) -> Response {
    let req: SignatureIdRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    respond(state.management.reinvestigate(req.signature_id).await)
}

async fn handle_details(State(state): State<AppState>, body: Bytes) -> Response {
    let req: SignatureIdRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    respond(state.management.get_signature_details(req.signature_id).await)
}

#[derive(Deserialize, Default)]
struct ListRequest {
    #[serde(default)]
    status: Option<SignatureStatus>,
}

async fn handle_list(State(state): State<AppState>, body: Bytes) -> Response {
    let req: ListRequest = if body.is_empty() {
        ListRequest::default()
    } else {
        match parse_body(&body) {
            Ok(r) => r,
            Err(resp) => return resp,
        }
    };
    respond(state.management.list_signatures(req.status).await)
}

fn parse_body<T: for<'de> Deserialize<'de>>(body: &Bytes) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "malformed webhook request body");
        ErrorBody::new(format!("invalid JSON body: {e}")).into_response(StatusCode::BAD_REQUEST)
    })
}

fn respond<T: Serialize>(result: rounds_core::Result<T>) -> Response {
    match result {
        Ok(value) => Json(value).into_response(),
        Err(err) => map_error(err).into_response(),
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

impl ErrorBody {
    fn new(message: impl Into<String>) -> Self {
        ErrorBody {
            status: "error",
            message: message.into(),
        }
    }

    fn into_response(self, code: StatusCode) -> Response {
        (code, Json(self)).into_response()
    }
}

fn map_error(err: DiagnosticError) -> Response {
    let status = match &err {
        DiagnosticError::NotFound(_) => StatusCode::NOT_FOUND,
        DiagnosticError::Validation(_) | DiagnosticError::Parse(_) => StatusCode::BAD_REQUEST,
        DiagnosticError::BudgetExceeded { .. } => StatusCode::PAYMENT_REQUIRED,
        DiagnosticError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        DiagnosticError::Transport(_) | DiagnosticError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    ErrorBody::new(err.to_string()).into_response(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use rounds_core::fakes::{MemorySignatureStore, MemoryTelemetry, MockDiagnosisEngine, RecordingNotifier};
    use rounds_core::{Investigator, ManagementService, PollService, TriageEngine};
    use tower::ServiceExt;

    fn build_router(api_key: Option<String>) -> Router {
        let telemetry = Arc::new(MemoryTelemetry::default());
        let store = Arc::new(MemorySignatureStore::default());
        let diagnosis = Arc::new(MockDiagnosisEngine::always_fails());
        let notification = Arc::new(RecordingNotifier::default());
        let triage = TriageEngine::default();

        let poll_investigator = Investigator::new(
            telemetry.clone(),
            store.clone(),
            diagnosis.clone(),
            notification.clone(),
            triage.clone(),
            Some("/code".to_string()),
        );
        let mgmt_investigator = Investigator::new(
            telemetry.clone(),
            store.clone(),
            diagnosis,
            notification,
            triage.clone(),
            Some("/code".to_string()),
        );
        let poll_service = Arc::new(PollService::new(
            telemetry.clone(),
            store.clone(),
            poll_investigator,
            triage,
            15,
            None,
        ));
        let management = Arc::new(ManagementService::new(store, telemetry, mgmt_investigator));

        router(poll_service, management, api_key)
    }

    #[tokio::test]
    async fn health_check_requires_no_auth() {
        let app = build_router(Some("secret".to_string()));
        let response = app
            .oneshot(HttpRequest::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_route_without_token_is_rejected() {
        let app = build_router(Some("secret".to_string()));
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/api/poll")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn mute_unknown_signature_maps_to_404() {
        let app = build_router(None);
        let body = serde_json::json!({ "signature_id": Uuid::new_v4() }).to_string();
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/api/mute")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_body_maps_to_400() {
        let app = build_router(None);
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/api/mute")
                    .header("content-type", "application/json")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
