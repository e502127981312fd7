//! API v1 routes.

mod reconcile;
mod worlds;

use axum::Router;

use crate::state::AppState;

/// Create API v1 routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/worlds", worlds::routes())
        .nest("/reconcile", reconcile::routes())
}
