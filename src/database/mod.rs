//! PostgreSQL connection pool, schema migrations and the change feed

pub mod migrations;
pub mod notify;
pub mod pool;

pub use notify::{change_channel, ChangeListener};
pub use pool::Database;
