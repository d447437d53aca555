//! Workshop API: REST backend for a vehicle-service workshop (customers, vehicles, services,
//! payments, staff) over PostgreSQL, with token authentication and filterable listings.

pub mod app;
pub mod auth;
pub mod error;
pub mod extractors;
pub mod filter;
pub mod handlers;
pub mod migration;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;

pub use error::{AppError, FieldErrors, SchemaError};
pub use migration::apply_migrations;
pub use service::CrudService;
pub use settings::{Settings, SettingsError};
pub use state::AppState;
