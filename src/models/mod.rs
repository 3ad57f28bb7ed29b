pub mod change;
pub mod listing;
pub mod log;
pub mod proxy;
pub mod signal;
pub mod valuation;

pub use change::*;
pub use listing::*;
pub use log::*;
pub use proxy::*;
pub use signal::*;
pub use valuation::*;
