//! Manual reconciliation trigger.

use axum::{extract::State, http::StatusCode, routing::post, Router};

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::controller::ControllerError;
use crate::state::AppState;

/// Create reconcile routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/", post(trigger_pass))
}

/// Run one reconciliation pass now.
///
/// POST /v1/reconcile
async fn trigger_pass(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let request_id = ctx.request_id;

    match state.controller().run_pass().await {
        Ok(_) => Ok(StatusCode::NO_CONTENT),
        Err(ControllerError::PassInProgress) => Err(ApiError::conflict(
            "pass_in_progress",
            "A reconciliation pass is already running",
        )
        .with_request_id(request_id)),
        Err(e) => {
            tracing::error!(
                error = %e,
                request_id = %request_id,
                consistency_risk = e.is_consistency_risk(),
                "Triggered reconciliation pass failed"
            );
            Err(ApiError::internal("reconcile_failed", e.to_string()).with_request_id(request_id))
        }
    }
}
