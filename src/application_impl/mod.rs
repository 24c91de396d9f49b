mod invalidation_strategy_impl;
mod jwt_codec;
mod session_event_sink_impl;
mod session_manager_impl;

pub use invalidation_strategy_impl::*;
pub use jwt_codec::*;
pub use session_event_sink_impl::*;
pub use session_manager_impl::*;
