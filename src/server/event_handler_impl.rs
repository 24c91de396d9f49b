use crate::application_port::*;
use crate::server::{ClusterEnvelope, EventHandler, HandleOutcome};
use std::sync::Arc;
use std::time::Duration;

/// Replays revocations made on peer nodes into the local cache.
pub struct RestrictionHandler {
    node_id: String,
    sessions: Arc<dyn SessionService>,
}

impl RestrictionHandler {
    pub fn new(node_id: impl Into<String>, sessions: Arc<dyn SessionService>) -> Self {
        Self {
            node_id: node_id.into(),
            sessions,
        }
    }
}

#[async_trait::async_trait]
impl EventHandler for RestrictionHandler {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<HandleOutcome> {
        let envelope = match serde_json::from_slice::<ClusterEnvelope>(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable session event");
                return Ok(HandleOutcome::SkipCommit);
            }
        };

        // the origin already mutated the store and wrote its own markers
        if envelope.origin == self.node_id {
            return Ok(HandleOutcome::SkipCommit);
        }

        let result = match &envelope.event {
            JwtManagerEvent::SessionInvalidated { payload } => {
                self.sessions.restrict_one(payload).await
            }
            JwtManagerEvent::AllSessionsInvalidated {
                subject,
                access_token_ttl,
            } => {
                self.sessions
                    .restrict_all(subject, Duration::from_secs(*access_token_ttl))
                    .await
            }
        };

        match result {
            Ok(()) => {
                tracing::debug!(origin = %envelope.origin, subject = %envelope.event.subject(), "peer revocation applied");
                Ok(HandleOutcome::Commit)
            }
            Err(e) => {
                tracing::warn!(origin = %envelope.origin, error = %e, "peer revocation failed");
                Ok(HandleOutcome::Retry)
            }
        }
    }
}
