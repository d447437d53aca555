//! Token routes, mounted under `/auth`.

use crate::handlers::auth::{obtain_token, refresh_token};
use crate::state::AppState;
use axum::{routing::post, Router};

pub fn auth_routes(state: AppState) -> Router {
    Router::new()
        .route("/token", post(obtain_token))
        .route("/token/refresh", post(refresh_token))
        .with_state(state)
}
