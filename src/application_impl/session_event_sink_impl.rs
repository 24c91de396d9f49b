use crate::application_port::*;

/// Sink for single-node deployments: events are dropped.
#[derive(Debug, Default)]
pub struct DiscardEventSink;

impl SessionEventSink for DiscardEventSink {
    fn emit(&self, event: JwtManagerEvent) {
        tracing::trace!(subject = %event.subject(), "session event discarded");
    }
}
