//! API middleware

mod auth;
mod cors;

pub use auth::{require_bearer, SharedSecretAuth};
pub use cors::cors_layer;
