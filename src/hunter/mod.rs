//! Market hunter engine
//!
//! One sweep runs SELECT_PROXY → FETCH (retry in place) → BYPASS when blocked
//! → EVALUATE → PERSIST. Network access goes through the [`MarketTransport`]
//! and [`BypassDriver`] seams.

pub mod bypass;
pub mod client;
pub mod engine;
pub mod retry;
pub mod route;

pub use bypass::{BrowserBypass, BrowserBypassConfig, BypassDriver};
pub use client::{HttpTransport, MarketTransport};
pub use engine::{Hunter, SweepReport, SweepSummary};
pub use retry::{next_action, FetchAction, FetchFailure};
pub use route::ProxyRoute;
