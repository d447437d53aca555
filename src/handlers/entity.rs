//! Entity CRUD handlers: list, read, create, update, partial update, delete.
//!
//! Every handler authenticates first; the entity is then resolved from the path segment.

use crate::error::AppError;
use crate::extractors::AuthUser;
use crate::filter::build_predicate;
use crate::response;
use crate::schema::EntityDef;
use crate::service::{CrudService, RequestValidator, WriteMode};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

fn entity<'m>(state: &'m AppState, path_segment: &str) -> Result<&'m EntityDef, AppError> {
    state
        .model
        .entity_by_path(path_segment)
        .ok_or_else(|| AppError::NotFound(path_segment.to_string()))
}

/// Ids are positive integers; anything else cannot name a row.
fn parse_id(entity: &EntityDef, id_str: &str) -> Result<i64, AppError> {
    id_str
        .parse::<i64>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| AppError::NotFound(format!("{} {}", entity.name, id_str)))
}

fn body_to_map(body: Result<Json<Value>, JsonRejection>) -> Result<Map<String, Value>, AppError> {
    let Json(value) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

pub async fn list(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(mut params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity(&state, &path_segment)?;
    let limit: Option<u32> = params.remove("limit").and_then(|v| v.parse().ok());
    let offset: Option<u32> = params.remove("offset").and_then(|v| v.parse().ok());
    let predicate = build_predicate(&state.model, entity, &params)?;
    let page = CrudService::list(&state.pool, entity, &predicate, limit, offset).await?;
    Ok(response::list_page(page))
}

pub async fn create(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity(&state, &path_segment)?;
    let body = body_to_map(body)?;
    let values = RequestValidator::validate(entity, &body, WriteMode::Create)?;
    let row = CrudService::create(&state.pool, entity, &values).await?;
    Ok(response::created(row))
}

pub async fn read(
    _user: AuthUser,
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity(&state, &path_segment)?;
    let id = parse_id(entity, &id_str)?;
    let row = CrudService::read(&state.pool, entity, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", entity.name, id)))?;
    Ok(response::ok(row))
}

/// PUT: every required field must be present; absent optional fields are left unchanged.
pub async fn update(
    user: AuthUser,
    state: State<AppState>,
    path: Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    write(user, state, path, body, WriteMode::Full).await
}

/// PATCH: only the supplied fields are validated and written.
pub async fn partial_update(
    user: AuthUser,
    state: State<AppState>,
    path: Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    write(user, state, path, body, WriteMode::Partial).await
}

async fn write(
    _user: AuthUser,
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
    mode: WriteMode,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let entity = entity(&state, &path_segment)?;
    let id = parse_id(entity, &id_str)?;
    let body = body_to_map(body)?;
    let values = RequestValidator::validate(entity, &body, mode)?;
    let row = CrudService::update(&state.pool, entity, id, &values)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", entity.name, id)))?;
    Ok(response::ok(row))
}

pub async fn delete(
    _user: AuthUser,
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity(&state, &path_segment)?;
    let id = parse_id(entity, &id_str)?;
    if !CrudService::delete(&state.pool, &state.model, entity, id).await? {
        return Err(AppError::NotFound(format!("{} {}", entity.name, id)));
    }
    Ok(StatusCode::NO_CONTENT)
}
