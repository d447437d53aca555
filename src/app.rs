//! Application assembly: pool, migrations, bootstrap user, model and router.

use crate::auth::{users, JwtKeys};
use crate::error::{AppError, SchemaError};
use crate::migration::apply_migrations;
use crate::routes::{auth_routes, common_routes, entity_routes};
use crate::schema::{entities, resolve, Model};
use crate::settings::Settings;
use crate::state::AppState;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// The workshop's entities, checked and indexed.
pub fn model() -> Result<Model, SchemaError> {
    resolve(entities::all())
}

/// Connect, migrate, create the bootstrap user when configured, and assemble the router.
pub async fn build(settings: &Settings) -> Result<(Router, PgPool), AppError> {
    let model = Arc::new(model()?);
    let pool = PgPoolOptions::new()
        .max_connections(settings.db_max_connections)
        .connect(&settings.database_url)
        .await?;
    apply_migrations(&pool, &model).await?;

    if let (Some(username), Some(password)) = (&settings.admin_username, &settings.admin_password) {
        users::ensure_user(&pool, username, password).await?;
    }

    let state = AppState {
        pool: pool.clone(),
        model,
        jwt: Arc::new(JwtKeys::new(
            &settings.jwt_secret,
            settings.access_token_ttl_secs,
            settings.refresh_token_ttl_secs,
        )),
    };
    let app = router(state).layer(RequestBodyLimitLayer::new(settings.body_limit_bytes));
    Ok((app, pool))
}

/// All routes for an existing state, with request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(common_routes(state.clone()))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/core", entity_routes(state))
        .layer(TraceLayer::new_for_http())
}
