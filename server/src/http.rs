//! HTTP direct-method endpoint of the hub emulator

use crate::command::{DispatchError, MethodDispatcher};
use crate::session::SessionManager;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use greenhouse_shared::sas::{SasError, SasToken};
use greenhouse_shared::{now_secs, timing, DirectMethodBody, DirectMethodResult, HubCredentials};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Shared state of the HTTP side
#[derive(Clone)]
pub struct HttpState {
    pub sessions: Arc<SessionManager>,
    pub dispatcher: Arc<MethodDispatcher>,
    /// Access policies accepted for direct method calls
    pub credentials: Arc<Vec<HubCredentials>>,
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/twins/{device_id}/methods", post(invoke_method))
        .route("/devices", get(list_devices))
        .with_state(state)
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "message": message.into() }))).into_response()
}

/// Check the `Authorization` header against the configured policies
fn authorize(credentials: &[HubCredentials], headers: &HeaderMap, now: u64) -> Result<SasToken, SasError> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| SasError::Malformed("missing Authorization header".into()))?;
    let token = SasToken::parse(raw)?;

    let mut outcome = Err(SasError::PolicyMismatch(token.key_name.clone().unwrap_or_default()));
    for policy in credentials
        .iter()
        .filter(|c| token.key_name.as_deref().map_or(true, |name| name == c.policy_name))
    {
        outcome = token.verify(policy, now);
        if outcome.is_ok() {
            break;
        }
    }
    outcome.map(|()| token)
}

async fn invoke_method(
    State(state): State<HttpState>,
    Path(device_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(e) = authorize(&state.credentials, &headers, now_secs()) {
        warn!(device = %device_id, error = %e, "unauthorized direct method");
        return error_body(StatusCode::UNAUTHORIZED, e.to_string());
    }

    let call: DirectMethodBody = match serde_json::from_slice(&body) {
        Ok(call) => call,
        Err(e) => return error_body(StatusCode::BAD_REQUEST, format!("malformed body: {e}")),
    };

    let timeout_secs = match call.response_timeout_in_seconds {
        0 => timing::METHOD_RESPONSE_TIMEOUT_SECS,
        secs => secs,
    };
    info!(device = %device_id, method = %call.method_name, timeout_secs, "direct method call");

    match state
        .dispatcher
        .invoke(
            &device_id,
            &call.method_name,
            call.payload,
            Duration::from_secs(timeout_secs),
        )
        .await
    {
        Ok(response) => (StatusCode::OK, Json(DirectMethodResult::from(response))).into_response(),
        Err(e @ (DispatchError::NotConnected(_) | DispatchError::Disconnected(_))) => {
            error_body(StatusCode::NOT_FOUND, e.to_string())
        }
        Err(e @ DispatchError::Timeout { .. }) => error_body(StatusCode::GATEWAY_TIMEOUT, e.to_string()),
        Err(e @ DispatchError::SendFailed { .. }) => error_body(StatusCode::BAD_GATEWAY, e.to_string()),
    }
}

async fn list_devices(State(state): State<HttpState>) -> Json<Vec<String>> {
    Json(state.sessions.connected_devices().await)
}
