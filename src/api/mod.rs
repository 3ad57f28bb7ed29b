//! API server implementation
//!
//! Provides REST API and WebSocket endpoints for sweeps, fleet syncs, signals and live changes.

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod websocket;

pub use server::ApiServer;
