//! Typed errors and HTTP mapping.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("missing reference: {entity}.{field} points at unknown entity '{target}'")]
    MissingReference {
        entity: &'static str,
        field: &'static str,
        target: String,
    },
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
    #[error("duplicate table: {0}")]
    DuplicateTable(String),
    #[error("duplicate field {field} on {entity}")]
    DuplicateField { entity: &'static str, field: String },
    #[error("default of {entity}.{field} is not one of its choices")]
    InvalidDefault {
        entity: &'static str,
        field: &'static str,
    },
    #[error("filter '{param}' on {entity} does not resolve to a field")]
    InvalidFilter {
        entity: &'static str,
        param: &'static str,
    },
}

/// Field name -> messages. Serialized as a flat JSON object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Ok(())` when nothing was collected, otherwise a validation error carrying all of it.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v.join(" ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(FieldErrors),
    #[error("authentication failed: {0}")]
    Unauthenticated(String),
    #[error("referential integrity: {0}")]
    ReferentialIntegrity(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

fn error_body(status: StatusCode, code: &str, message: String) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: code.to_string(),
            message,
        },
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            AppError::Unauthenticated(reason) => {
                tracing::warn!(%reason, "authentication failed");
                (StatusCode::UNAUTHORIZED, [(header::WWW_AUTHENTICATE, "Bearer")]).into_response()
            }
            AppError::ReferentialIntegrity(reason) => {
                tracing::info!(%reason, "delete refused");
                StatusCode::CONFLICT.into_response()
            }
            AppError::NotFound(what) => {
                error_body(StatusCode::NOT_FOUND, "not_found", format!("not found: {}", what))
            }
            AppError::BadRequest(msg) => error_body(StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::Db(sqlx::Error::RowNotFound) => {
                error_body(StatusCode::NOT_FOUND, "not_found", "not found".into())
            }
            AppError::Db(e) => {
                tracing::error!(error = %e, "database error");
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "database error".into(),
                )
            }
            AppError::Schema(e) => {
                tracing::error!(error = %e, "schema error");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "schema_error", e.to_string())
            }
            AppError::Internal(msg) => {
                tracing::error!(%msg, "internal error");
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".into(),
                )
            }
        }
    }
}
