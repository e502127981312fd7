//! World listing and join endpoints.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use worldfleet_id::{Location, PlayerId, WorldId};

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::listing::list_active_worlds;
use crate::models::WorldSession;
use crate::state::AppState;

/// Create world routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_worlds))
        .route("/join", post(join_world))
}

#[derive(Debug, Deserialize)]
pub struct ListWorldsQuery {
    pub location: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListWorldsResponse {
    pub worlds: Vec<WorldSession>,
}

#[derive(Debug, Deserialize)]
pub struct JoinWorldRequest {
    pub location: String,
    pub world_id: String,
    pub player_id: String,
}

/// List the active worlds of one location.
///
/// GET /v1/worlds?location=
async fn list_worlds(
    ctx: RequestContext,
    State(state): State<AppState>,
    Query(query): Query<ListWorldsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = ctx.request_id;

    let location = query
        .location
        .as_deref()
        .ok_or_else(|| {
            ApiError::bad_request("missing_location", "location query parameter is required")
                .with_request_id(request_id.clone())
        })
        .and_then(|raw| {
            Location::parse(raw).map_err(|e| {
                ApiError::bad_request("invalid_location", e.to_string())
                    .with_request_id(request_id.clone())
            })
        })?;

    let worlds = list_active_worlds(state.registry(), &location, state.page_size())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, request_id = %request_id, location = %location, "Failed to list worlds");
            ApiError::internal("internal_error", "Failed to list worlds")
                .with_request_id(request_id.clone())
        })?;

    Ok(Json(ListWorldsResponse { worlds }))
}

/// Reserve a player slot in a world.
///
/// POST /v1/worlds/join
async fn join_world(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(req): Json<JoinWorldRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = ctx.request_id;
    let invalid = |code: &str, e: worldfleet_id::NameError| {
        ApiError::bad_request(code, e.to_string()).with_request_id(request_id.clone())
    };

    let location = Location::parse(&req.location).map_err(|e| invalid("invalid_location", e))?;
    let world_id = WorldId::parse(&req.world_id).map_err(|e| invalid("invalid_world_id", e))?;
    let player_id = PlayerId::parse(&req.player_id).map_err(|e| invalid("invalid_player_id", e))?;

    let reservation = state
        .admission()
        .admit_player(&location, &world_id, &player_id)
        .await
        .map_err(|e| {
            tracing::info!(
                error = %e,
                request_id = %request_id,
                location = %location,
                world_id = %world_id,
                "Join refused"
            );
            ApiError::from(e).with_request_id(request_id.clone())
        })?;

    Ok(Json(reservation))
}
