use crate::application_port::JwtManagerEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What travels on the bus: the event plus the node that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterEnvelope {
    pub origin: String,
    pub event: JwtManagerEvent,
}

#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &[u8], payload: &[u8]) -> anyhow::Result<()>;
}

#[async_trait::async_trait]
pub trait EventConsumer: Send + Sync {
    async fn run(
        &self,
        consumer_group_id: &str,
        topics: &[&str],
        handler: Arc<dyn EventHandler>,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, PartialEq, Eq)]
pub enum HandleOutcome {
    Commit,
    Retry,
    SkipCommit,
}

#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<HandleOutcome>;
}
