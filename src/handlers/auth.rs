//! Token endpoints: obtain a pair with credentials, refresh an access token.

use crate::auth::{password, users, TokenPair, TokenType};
use crate::error::{AppError, FieldErrors};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh: String,
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(v)| v)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

pub async fn obtain_token(
    State(state): State<AppState>,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, AppError> {
    let req = json_body(body)?;
    let mut errors = FieldErrors::default();
    if req.username.trim().is_empty() {
        errors.add("username", "This field is required.");
    }
    if req.password.is_empty() {
        errors.add("password", "This field is required.");
    }
    errors.into_result()?;

    let user = users::find_by_username(&state.pool, req.username.trim())
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthenticated(format!("unknown or inactive user {}", req.username)))?;
    if !password::verify_password(req.password, user.password_hash.clone()).await? {
        return Err(AppError::Unauthenticated(format!("bad password for {}", user.username)));
    }
    let pair = state.jwt.issue_pair(user.id)?;
    users::touch_last_login(&state.pool, user.id).await?;
    tracing::info!(user_id = user.id, "token pair issued");
    Ok(Json(pair))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let req = json_body(body)?;
    if req.refresh.trim().is_empty() {
        return Err(AppError::Validation(FieldErrors::single("refresh", "This field is required.")));
    }
    let claims = state.jwt.verify(req.refresh.trim(), TokenType::Refresh)?;
    let user = users::find_active_by_id(&state.pool, claims.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthenticated(format!("user {} inactive or gone", claims.user_id)))?;
    let access = state.jwt.issue_access(user.id)?;
    Ok(Json(json!({ "access": access })))
}
