//! Shared application state for all routes.

use crate::auth::JwtKeys;
use crate::schema::Model;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Entity definitions, resolved once at startup.
    pub model: Arc<Model>,
    pub jwt: Arc<JwtKeys>,
}
