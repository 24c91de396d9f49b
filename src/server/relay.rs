use crate::application_port::JwtManagerEvent;
use crate::server::{ClusterEnvelope, EventPublisher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

const PUBLISH_BACKOFF: Duration = Duration::from_secs(2);

/// Drains locally emitted session events onto the cluster topic.
pub struct Relay {
    receiver: UnboundedReceiver<JwtManagerEvent>,
    event_publisher: Arc<dyn EventPublisher>,
    topic: String,
    node_id: String,
    cancellation_token: CancellationToken,
}

impl Relay {
    pub fn new(
        receiver: UnboundedReceiver<JwtManagerEvent>,
        event_publisher: Arc<dyn EventPublisher>,
        topic: &str,
        node_id: &str,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            receiver,
            event_publisher,
            topic: topic.to_owned(),
            node_id: node_id.to_owned(),
            cancellation_token,
        }
    }

    fn build_envelope(&self, event: JwtManagerEvent) -> anyhow::Result<Vec<u8>> {
        let envelope = ClusterEnvelope {
            origin: self.node_id.clone(),
            event,
        };
        Ok(serde_json::to_vec(&envelope)?)
    }

    /// Publishes one event, backing off between failed attempts until it
    /// goes through or the relay is cancelled.
    async fn forward(&self, event: JwtManagerEvent) -> anyhow::Result<()> {
        let key = event.subject().as_str().as_bytes().to_vec();
        let payload = self.build_envelope(event)?;

        loop {
            match self
                .event_publisher
                .publish(&self.topic, &key, &payload)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(error = %format!("{e:#}"), "publish failed, backing off");
                }
            }

            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    anyhow::bail!("relay cancelled before the event was published");
                }
                _ = tokio::time::sleep(PUBLISH_BACKOFF) => {}
            }
        }
    }

    /// Makes one publish attempt for every event still queued at shutdown.
    async fn drain(&mut self) {
        self.receiver.close();

        let mut sent = 0usize;
        let mut lost = 0usize;
        while let Ok(event) = self.receiver.try_recv() {
            let subject = event.subject().clone();
            let key = subject.as_str().as_bytes().to_vec();
            let result = match self.build_envelope(event) {
                Ok(payload) => {
                    self.event_publisher
                        .publish(&self.topic, &key, &payload)
                        .await
                }
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => sent += 1,
                Err(e) => {
                    lost += 1;
                    tracing::error!(subject = %subject, error = %format!("{e:#}"), "session event not propagated");
                }
            }
        }
        tracing::info!(sent, lost, "relay drained");
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("Relay shutting down...");
                    break;
                }
                event = self.receiver.recv() => event,
            };

            let Some(event) = event else {
                tracing::info!("all event sinks dropped, relay stopping");
                break;
            };

            if let Err(e) = self.forward(event).await {
                tracing::error!("Relay error: {:#}", e);
            }
        }
        if self.cancellation_token.is_cancelled() {
            self.drain().await;
        }
        Ok(())
    }
}
