//! Entity CRUD routes. Parameterized paths hand the segment and id to the handlers, which
//! resolve the entity from the model; unknown segments are 404 once the caller is authenticated.

use crate::handlers::entity::{create, delete, list, partial_update, read, update};
use crate::state::AppState;
use axum::{routing::get, Router};

/// Mounted under `/core`: `/<path>` (collection) and `/<path>/:id` (item).
pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/:path_segment", get(list).post(create))
        .route(
            "/:path_segment/:id",
            get(read).put(update).patch(partial_update).delete(delete),
        )
        .with_state(state)
}
