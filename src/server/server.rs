use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::server::*;
use crate::settings::{self, Settings};
use anyhow::{Context, anyhow};
use jsonwebtoken::Algorithm;
use nanoid::nanoid;
use redis::aio::ConnectionManager;
use sqlx::{MySql, Pool};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const JWT_SECRET_ENV: &str = "TOKENWARD_JWT_SECRET";

/// One fleet member: a session manager over the configured backends, plus
/// the relay and consumer that keep its revocations in sync with peers.
pub struct Server {
    pub session_service: Arc<dyn SessionService>,
    pub node_id: String,
    relay_handle: Mutex<Option<JoinHandle<()>>>,
    consumer_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pool: Option<Pool<MySql>>,
}

async fn redis_manager(dsn: Option<&str>) -> anyhow::Result<ConnectionManager> {
    let dsn = dsn.ok_or_else(|| anyhow!("redis backend needs a dsn"))?;
    let client = redis::Client::open(dsn)?;
    Ok(client.get_connection_manager().await?)
}

pub fn jwt_config(jwt: &settings::Jwt, session: &settings::Session) -> anyhow::Result<JwtConfig> {
    let algorithm = Algorithm::from_str(&jwt.algorithm)
        .map_err(|e| anyhow!("unknown jwt algorithm {:?}: {}", jwt.algorithm, e))?;

    let secret = match (&jwt.private_key_path, &jwt.public_key_path) {
        (Some(private_path), Some(public_path)) => Secret::KeyPair {
            private_pem: std::fs::read(private_path)
                .with_context(|| format!("reading {private_path}"))?,
            public_pem: std::fs::read(public_path)
                .with_context(|| format!("reading {public_path}"))?,
        },
        _ => {
            let secret = std::env::var(JWT_SECRET_ENV)
                .ok()
                .or_else(|| jwt.secret.clone())
                .ok_or_else(|| anyhow!("jwt.secret or {JWT_SECRET_ENV} must be set"))?;
            Secret::Hmac(secret.into_bytes())
        }
    };

    let sign = SignDefaults {
        algorithm,
        expires_in: Duration::from_secs(jwt.expires_in),
        issuer: jwt.issuer.clone(),
        audience: jwt.audience.clone(),
    };

    Ok(JwtConfig::new(secret, sign)
        .with_leeway(jwt.leeway)
        .with_access_ttl_cap(session.cap_access_ttl_to_refresh_ttl))
}

pub fn strategy_config(session: &settings::Session) -> StrategyConfig {
    StrategyConfig {
        refresh_token_length: session.refresh_token_length,
        refresh_token_ttl: Duration::from_secs(session.refresh_token_ttl),
    }
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let alphabet: [char; 16] = [
            '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', 'a', 'b', 'c', 'd', 'e', 'f',
        ];
        let node_id = settings
            .cluster
            .node_id
            .clone()
            .unwrap_or_else(|| nanoid!(10, &alphabet));

        let mut pool = None;
        let storage: Arc<dyn RefreshTokensStorage> = match settings.storage.backend.as_str() {
            "memory" => Arc::new(MemoryRefreshTokensStorage::new()),
            "redis" => Arc::new(RedisRefreshTokensStorage::new(
                redis_manager(settings.storage.dsn.as_deref()).await?,
                settings.storage.prefix.clone(),
            )),
            "mysql" => {
                let dsn = settings
                    .storage
                    .dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("mysql backend needs a dsn"))?;
                let p = Pool::<MySql>::connect(dsn).await?;
                pool = Some(p.clone());
                Arc::new(MySqlRefreshTokensStorage::new(p))
            }
            other => return Err(anyhow!("Unknown storage backend: {}", other)),
        };

        let cache: Arc<dyn InvalidAccessTokensCache> = match settings.cache.backend.as_str() {
            "memory" => Arc::new(MemoryInvalidAccessTokensCache::new()),
            "redis" => Arc::new(RedisInvalidAccessTokensCache::new(
                redis_manager(settings.cache.dsn.as_deref()).await?,
                settings.cache.prefix.clone(),
            )),
            other => return Err(anyhow!("Unknown cache backend: {}", other)),
        };

        let strategy: Arc<dyn InvalidationStrategy> = Arc::new(
            RefreshTokenInvalidationStrategy::try_new(
                storage,
                cache,
                strategy_config(&settings.session),
            )?,
        );
        let jwt = jwt_config(&settings.jwt, &settings.session)?;

        let cancel = CancellationToken::new();

        if !settings.cluster.enabled {
            let session_service: Arc<dyn SessionService> = Arc::new(JwtSessionManager::try_new(
                jwt,
                strategy,
                Arc::new(DiscardEventSink),
            )?);
            info!(node_id = %node_id, "session node started (standalone)");

            return Ok(Self {
                session_service,
                node_id,
                relay_handle: Mutex::new(None),
                consumer_handle: Mutex::new(None),
                cancel,
                pool,
            });
        }

        // region cluster

        let (sink, receiver) = ChannelEventSink::channel();
        let session_service: Arc<dyn SessionService> =
            Arc::new(JwtSessionManager::try_new(jwt, strategy, Arc::new(sink))?);

        let topic = settings.cluster.topic.clone();
        let bootstrap = settings.cluster.bootstrap_server.as_str();

        let publisher: Arc<dyn EventPublisher> = Arc::new(KafkaPublisher::new(
            bootstrap,
            &format!("tokenward-pub-{}", node_id),
        )?);
        let consumer: Arc<dyn EventConsumer> = Arc::new(KafkaConsumer::new(
            bootstrap,
            &format!("tokenward-sub-{}", node_id),
            cancel.clone(),
        ));
        let handler: Arc<dyn EventHandler> = Arc::new(RestrictionHandler::new(
            node_id.clone(),
            session_service.clone(),
        ));
        let relay = Relay::new(receiver, publisher, &topic, &node_id, cancel.clone());

        let group_id = format!("tokenward-restrict-{}", node_id);
        let consumer_handle = tokio::spawn(async move {
            if let Err(e) = consumer.run(&group_id, &[topic.as_str()], handler).await {
                error!("consumer stopped: {:#}", e);
            }
        });
        let relay_handle = tokio::spawn(async move {
            let _ = relay.run().await;
        });

        // endregion

        info!(node_id = %node_id, "session node started (cluster)");

        Ok(Self {
            session_service,
            node_id,
            relay_handle: Mutex::new(Some(relay_handle)),
            consumer_handle: Mutex::new(Some(consumer_handle)),
            cancel,
            pool,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let relay = self.relay_handle.lock().ok().and_then(|mut lock| lock.take());
        if let Some(handle) = relay {
            let r = handle.await;
            info!("relay handle dropped: {:?}", r);
        }
        let consumer = self
            .consumer_handle
            .lock()
            .ok()
            .and_then(|mut lock| lock.take());
        if let Some(handle) = consumer {
            let r = handle.await;
            info!("consumer handle dropped: {:?}", r);
        }

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
