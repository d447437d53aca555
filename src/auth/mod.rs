//! Token issuing, password hashing and the user store.

pub mod jwt;
pub mod password;
pub mod users;

pub use jwt::{Claims, JwtKeys, TokenPair, TokenType};
