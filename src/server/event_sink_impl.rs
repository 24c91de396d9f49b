use crate::application_port::*;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Hands events to the relay task without blocking the caller.
pub struct ChannelEventSink {
    sender: UnboundedSender<JwtManagerEvent>,
}

impl ChannelEventSink {
    pub fn channel() -> (Self, UnboundedReceiver<JwtManagerEvent>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl SessionEventSink for ChannelEventSink {
    fn emit(&self, event: JwtManagerEvent) {
        if let Err(e) = self.sender.send(event) {
            tracing::warn!(subject = %e.0.subject(), "relay is gone, session event not propagated");
        }
    }
}
