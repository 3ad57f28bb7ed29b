//! Hunter - proxy-routed marketplace harvesting
//!
//! Sweeps marketplace search APIs through a self-validating proxy fleet and
//! turns under-priced listings into trading signals.
//!
//! ## Features
//!
//! - Proxy fleet harvesting, liveness probing and latency ranking
//! - Retrying fetches with exponential backoff and a headless-browser bypass
//! - Brand-aware valuation with a fixed admission margin
//! - PostgreSQL persistence with change notifications streamed over WebSocket
//! - Shared-secret REST API for sweeps, fleet syncs and execution reports

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod fleet;
pub mod hunter;
pub mod models;
pub mod repository;
pub mod services;

pub use config::Config;
pub use database::Database;
pub use error::{HunterError, Result};
