//! Health endpoints for load balancers and orchestrators.
//!
//! `/livez` answers while the process runs, `/healthz` while it serves HTTP,
//! and `/readyz` only while the registry is reachable. Admission and listing
//! cannot work without it.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::registry::RegistryResult;
use crate::state::AppState;

const SERVICE_NAME: &str = "world-manager";

/// Status reported for the service and for each dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Ok,
    Unavailable,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct HealthResponse {
    pub status: Health,
    pub service: String,
    pub version: String,
    pub timestamp: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct Components {
    pub registry: ComponentHealth,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct ComponentHealth {
    pub status: Health,

    /// Why the component is unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthResponse {
    fn new(status: Health, components: Option<Components>) -> Self {
        Self {
            status,
            service: SERVICE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now().to_rfc3339(),
            components,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/livez", get(livez))
}

async fn healthz() -> impl IntoResponse {
    Json(HealthResponse::new(Health::Ok, None))
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let (status, body) = readiness(state.registry().health_check().await);
    (status, Json(body))
}

/// The service is ready exactly when the registry is.
fn readiness(registry: RegistryResult<()>) -> (StatusCode, HealthResponse) {
    let (code, health, message) = match registry {
        Ok(()) => (StatusCode::OK, Health::Ok, None),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Health::Unavailable,
            Some(e.to_string()),
        ),
    };

    let components = Components {
        registry: ComponentHealth {
            status: health,
            message,
        },
    };
    (code, HealthResponse::new(health, Some(components)))
}

async fn livez() -> impl IntoResponse {
    StatusCode::OK
}
