//! HTTP handlers for entity CRUD and token issuance.

pub mod auth;
pub mod entity;
