//! Process-wide logging. `Logger::new_bootstrap` must run once, before
//! settings are parsed; the filter is reloaded from settings afterwards.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
