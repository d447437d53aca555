//! CrudService: generic CRUD using the safe SQL builder.

mod crud;
mod validation;
pub use crud::{CrudService, Page, DEFAULT_LIMIT, MAX_LIMIT};
pub use validation::{RequestValidator, WriteMode, WriteSet};
