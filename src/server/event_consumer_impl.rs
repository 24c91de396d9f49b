use crate::server::{EventConsumer, EventHandler, HandleOutcome};
use futures_util::StreamExt;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::{ClientConfig, Message};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const RETRY_BASE: Duration = Duration::from_millis(100);
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(5);

pub struct KafkaConsumer {
    bootstrap_server: String,
    client_id: String,
    cancellation_token: CancellationToken,
}

impl KafkaConsumer {
    pub fn new(
        bootstrap_server: &str,
        client_id: &str,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            bootstrap_server: bootstrap_server.to_string(),
            client_id: client_id.to_string(),
            cancellation_token,
        }
    }

    async fn ensure_topics(bootstrap: &str, topics: &[&str]) -> anyhow::Result<()> {
        let admin: AdminClient<_> = ClientConfig::new()
            .set("bootstrap.servers", bootstrap)
            .create()?;

        let new_topics: Vec<_> = topics
            .iter()
            .map(|t| NewTopic::new(t, 1, TopicReplication::Fixed(1)))
            .collect();

        // already-existing topics come back as per-topic errors
        let _ = admin
            .create_topics(&new_topics, &AdminOptions::new())
            .await?;

        Ok(())
    }

    /// Runs the handler until it commits or skips. A message that keeps
    /// failing is retried with backoff until the consumer is cancelled, in
    /// which case `false` is returned and the offset must stay uncommitted.
    async fn handle_with_retry(&self, handler: &dyn EventHandler, payload: &[u8]) -> bool {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match handler.handle(payload).await {
                Ok(HandleOutcome::Commit | HandleOutcome::SkipCommit) => return true,
                Ok(HandleOutcome::Retry) => {
                    tracing::warn!(attempt, "handler asked for retry");
                }
                Err(e) => {
                    tracing::error!(attempt, error = ?e, "handler error");
                }
            }

            let backoff = (RETRY_BASE * attempt).min(MAX_RETRY_BACKOFF);
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    tracing::warn!(attempt, "consumer cancelled with an unhandled session event");
                    return false;
                }
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }
}

#[async_trait::async_trait]
impl EventConsumer for KafkaConsumer {
    async fn run(
        &self,
        consumer_group_id: &str,
        topics: &[&str],
        handler: Arc<dyn EventHandler>,
    ) -> anyhow::Result<()> {
        // every node reads every event, so each one joins its own group and
        // only cares about what is published from now on
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.bootstrap_server)
            .set("client.id", &self.client_id)
            .set("group.id", consumer_group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "latest")
            .create()?;

        Self::ensure_topics(&self.bootstrap_server, topics).await?;
        consumer.subscribe(topics)?;

        let mut stream = consumer.stream();

        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("Kafka consumer shutting down...");
                    break;
                }
                msg = stream.next() => msg,
            };

            let Some(message) = result else {
                tracing::error!("Kafka consumer stream terminated");
                break;
            };

            match message {
                Err(e) => {
                    tracing::warn!(error = ?e, "consumer poll error");
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                Ok(m) => {
                    let payload = m.payload().unwrap_or(&[]);
                    if !self.handle_with_retry(handler.as_ref(), payload).await {
                        break;
                    }

                    if let Err(e) = consumer.commit_message(&m, CommitMode::Async) {
                        tracing::warn!(error = ?e, "commit failed but ignored");
                    }
                }
            }
        }

        drop(stream);
        consumer.unsubscribe();

        Ok(())
    }
}
