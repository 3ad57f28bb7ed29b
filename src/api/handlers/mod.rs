//! API request handlers

pub mod health;
pub mod logs;
pub mod proxies;
pub mod signals;
pub mod sweep;
