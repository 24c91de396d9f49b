mod invalidation_strategy;
mod session_error;
mod session_event;
mod session_service;

pub use invalidation_strategy::*;
pub use session_error::*;
pub use session_event::*;
pub use session_service::*;
