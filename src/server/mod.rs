//! HTTP boundary
//!
//! `POST /deploy` reads the tenant identity from a configurable header and the
//! provisioning request from the JSON body, then runs the provisioner.
//! `GET /healthz` answers as long as the server is accepting requests.
//!
//! Error responses are JSON `{"ok": false, "error": ..., "stage": ...}`; `stage` is only
//! present when provisioning failed while applying a resource.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::client::ApiError;
use crate::provisioner::{ProvisionResult, Provisioner};
use crate::request::ProvisionRequest;
use crate::Error;

/// Shared state for the HTTP handlers
pub struct AppState {
    /// Orchestrator shared by all requests
    pub provisioner: Provisioner,
    /// Header carrying the tenant identity
    pub tenant_header: HeaderName,
}

impl AppState {
    /// Create handler state
    pub fn new(provisioner: Provisioner, tenant_header: HeaderName) -> Self {
        Self {
            provisioner,
            tenant_header,
        }
    }
}

/// Failure of a deploy request
#[derive(Debug, Error)]
pub enum DeployError {
    /// The tenant header is absent, empty or not valid UTF-8
    #[error("missing tenant identity header '{0}'")]
    MissingTenant(String),

    /// The body is not a JSON provisioning request
    #[error("invalid request body: {}", .0.body_text())]
    InvalidBody(#[from] JsonRejection),

    /// Provisioning failed
    #[error(transparent)]
    Provision(#[from] Error),
}

impl DeployError {
    fn status(&self) -> StatusCode {
        match self {
            DeployError::MissingTenant(_) => StatusCode::UNAUTHORIZED,
            DeployError::InvalidBody(rejection) => rejection.status(),
            DeployError::Provision(e) => match e {
                Error::Validation { .. } => StatusCode::BAD_REQUEST,
                Error::Apply(apply) => match apply.source {
                    ApiError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::BAD_GATEWAY,
                },
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for DeployError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "ok": false,
            "error": self.to_string(),
        });
        if let DeployError::Provision(e) = &self {
            if let Some(stage) = e.stage() {
                body["stage"] = json!(stage.as_str());
            }
        }

        (status, Json(body)).into_response()
    }
}

/// Tenant identity from the configured header
fn tenant_from_headers<'a>(
    headers: &'a HeaderMap,
    name: &HeaderName,
) -> Result<&'a str, DeployError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DeployError::MissingTenant(name.to_string()))
}

/// Deploy endpoint handler
pub async fn deploy_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<ProvisionRequest>, JsonRejection>,
) -> Result<Json<ProvisionResult>, DeployError> {
    let tenant = tenant_from_headers(&headers, &state.tenant_header)?;
    let Json(request) = body?;
    debug!(tenant = %tenant, "Deploy request received");

    match state.provisioner.provision(tenant, &request).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            warn!(tenant = %tenant, error = %e, "Deploy request failed");
            Err(e.into())
        }
    }
}

/// Liveness handler
pub async fn healthz() -> &'static str {
    "ok"
}

/// Create the HTTP router
///
/// Routes:
/// - `POST /deploy` - Provision or converge the caller's runtime
/// - `GET /healthz` - Liveness
pub fn router(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .route("/deploy", post(deploy_handler))
        .route("/healthz", get(healthz))
        .with_state(state)
}
