//! Standard response envelope helpers.

use crate::service::Page;
use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
pub struct ListEnvelope<T> {
    pub data: Vec<T>,
    pub meta: ListMeta,
}

#[derive(Serialize)]
pub struct ListMeta {
    /// Rows in this page.
    pub count: u64,
    /// Rows matching the filters across all pages.
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
}

pub fn list_page(page: Page) -> (StatusCode, Json<ListEnvelope<Value>>) {
    let count = page.rows.len() as u64;
    (
        StatusCode::OK,
        Json(ListEnvelope {
            data: page.rows,
            meta: ListMeta {
                count,
                total: page.total,
                limit: page.limit,
                offset: page.offset,
            },
        }),
    )
}

pub fn created(doc: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(doc))
}

pub fn ok(doc: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(doc))
}
