mod event_consumer_impl;
mod event_handler_impl;
mod event_publisher_impl;
mod event_sink_impl;
mod port;
mod relay;
mod server;

pub use event_consumer_impl::*;
pub use event_handler_impl::*;
pub use event_publisher_impl::*;
pub use event_sink_impl::*;
pub use port::*;
pub use relay::*;
pub use server::*;
