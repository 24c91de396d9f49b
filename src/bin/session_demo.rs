//! Walks through a session lifecycle on two nodes sharing one in-memory
//! store, replicating revocations by hand the way the cluster relay does.

use serde_json::json;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tokenward::application_impl::*;
use tokenward::application_port::*;
use tokenward::domain_model::*;
use tokenward::domain_port::*;
use tokenward::infra_memory::*;
use tokenward::logger::*;
use tokio::sync::mpsc::UnboundedReceiver;

struct Collect(tokio::sync::mpsc::UnboundedSender<JwtManagerEvent>);

impl SessionEventSink for Collect {
    fn emit(&self, event: JwtManagerEvent) {
        let _ = self.0.send(event);
    }
}

fn node(
    storage: Arc<dyn RefreshTokensStorage>,
) -> anyhow::Result<(JwtSessionManager, UnboundedReceiver<JwtManagerEvent>)> {
    let strategy = RefreshTokenInvalidationStrategy::try_new(
        storage,
        Arc::new(MemoryInvalidAccessTokensCache::new()),
        StrategyConfig::default(),
    )?;
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let config = JwtConfig::new(
        Secret::Hmac(b"session-demo-secret".to_vec()),
        SignDefaults {
            issuer: Some("session_demo".to_string()),
            ..SignDefaults::default()
        },
    );
    let manager = JwtSessionManager::try_new(config, Arc::new(strategy), Arc::new(Collect(tx)))?;
    Ok((manager, rx))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    logger.reload_from_config(&LogConfig {
        filter: "tokenward=debug,session_demo=debug".to_string(),
    })?;

    let storage: Arc<dyn RefreshTokensStorage> = Arc::new(MemoryRefreshTokensStorage::new());
    let (node_a, _events_a) = node(storage.clone())?;
    let (node_b, mut events_b) = node(storage)?;

    let ctx = UserSessionOperationContext::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 7)))
        .with_device(Device::new("laptop", "ThinkPad"))
        .with_location("Lisbon");
    let claims = json!({"role": "editor", "tenant": "acme"})
        .as_object()
        .cloned()
        .unwrap_or_default();

    let tokens = node_a
        .create(claims.clone(), SignOptions::new("user-1"), ctx.clone())
        .await?;
    info!(refresh_token = %tokens.refresh_token.0, "created");

    let payload = node_b.read(&tokens.access_token.0, None).await?;
    info!(?payload, "read on node b");

    let refreshed = node_b
        .update(
            &tokens.refresh_token.0,
            claims,
            SignOptions::new("user-1"),
            ctx,
        )
        .await?;
    info!(access_token = %refreshed.0, "refreshed on node b");

    for (token, session) in node_a.read_all(&Subject::from("user-1")).await? {
        info!(anchor = %Anchor::of(&token), ?session, "active session");
    }

    node_b
        .delete_one(&payload.sub, &tokens.refresh_token.0, &payload)
        .await?;

    // what the relay and the restriction handler would do over Kafka
    while let Ok(event) = events_b.try_recv() {
        if let JwtManagerEvent::SessionInvalidated { payload } = &event {
            node_a.restrict_one(payload).await?;
        }
    }

    match node_a.read(&tokens.access_token.0, None).await {
        Err(e) => info!(kind = ?e.kind(), "node a rejects the token: {}", e),
        Ok(_) => warn!("node a still accepts the token"),
    }

    Ok(())
}
