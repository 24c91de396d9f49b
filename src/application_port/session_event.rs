use crate::domain_model::{IssuedJwtPayload, Subject};
use serde::{Deserialize, Serialize};

/// Lifecycle events a manager emits after a local revocation succeeded.
/// Peers replay them through `restrict_one` / `restrict_all`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JwtManagerEvent {
    SessionInvalidated {
        payload: IssuedJwtPayload,
    },
    AllSessionsInvalidated {
        subject: Subject,
        access_token_ttl: u64,
    },
}

impl JwtManagerEvent {
    pub fn subject(&self) -> &Subject {
        match self {
            JwtManagerEvent::SessionInvalidated { payload } => &payload.sub,
            JwtManagerEvent::AllSessionsInvalidated { subject, .. } => subject,
        }
    }
}

pub trait SessionEventSink: Send + Sync {
    /// Called synchronously; must not block.
    fn emit(&self, event: JwtManagerEvent);
}
