use serde_json::{Map, json};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokenward::application_impl::*;
use tokenward::application_port::*;
use tokenward::domain_model::*;
use tokenward::domain_port::*;
use tokenward::infra_memory::*;
use tokenward::server::*;

#[derive(Default)]
struct RecordingEventSink {
    events: Mutex<Vec<JwtManagerEvent>>,
}

impl RecordingEventSink {
    fn take(&self) -> Vec<JwtManagerEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl SessionEventSink for RecordingEventSink {
    fn emit(&self, event: JwtManagerEvent) {
        self.events.lock().unwrap().push(event);
    }
}

struct Node {
    manager: Arc<JwtSessionManager>,
    events: Arc<RecordingEventSink>,
}

fn node_with(storage: Arc<dyn RefreshTokensStorage>, config: JwtConfig) -> Node {
    let strategy = RefreshTokenInvalidationStrategy::try_new(
        storage,
        Arc::new(MemoryInvalidAccessTokensCache::new()),
        StrategyConfig::default(),
    )
    .unwrap();
    let events = Arc::new(RecordingEventSink::default());
    let manager =
        JwtSessionManager::try_new(config, Arc::new(strategy), events.clone()).unwrap();
    Node {
        manager: Arc::new(manager),
        events,
    }
}

fn config() -> JwtConfig {
    JwtConfig::new(
        Secret::Hmac(b"integration-secret".to_vec()),
        SignDefaults {
            expires_in: Duration::from_secs(60),
            issuer: Some("tokenward".to_string()),
            ..SignDefaults::default()
        },
    )
}

fn node(storage: Arc<dyn RefreshTokensStorage>) -> Node {
    node_with(storage, config())
}

fn ctx() -> UserSessionOperationContext {
    UserSessionOperationContext::new(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn claims() -> CustomClaims {
    json!({"role": "admin", "tenant": "acme"})
        .as_object()
        .cloned()
        .unwrap()
}

#[tokio::test]
async fn created_session_reads_back_custom_claims() {
    let n = node(Arc::new(MemoryRefreshTokensStorage::new()));
    let tokens = n
        .manager
        .create(claims(), SignOptions::new("alice"), ctx())
        .await
        .unwrap();

    let payload = n.manager.read(&tokens.access_token.0, None).await.unwrap();
    assert_eq!(payload.sub, Subject::from("alice"));
    assert_eq!(payload.anc, Anchor::of(&tokens.refresh_token.0));
    assert_eq!(payload.iss.as_deref(), Some("tokenward"));
    assert_eq!(payload.role, Some(json!("admin")));
    assert_eq!(payload.claims.get("tenant"), Some(&json!("acme")));
    assert_eq!(payload.exp - payload.iat, 60);
    assert_eq!(payload.exp, tokens.access_token_expires_at.timestamp());
}

#[tokio::test]
async fn zero_lifetime_token_is_expired() {
    let n = node(Arc::new(MemoryRefreshTokensStorage::new()));
    let expired = n
        .manager
        .create(
            Map::new(),
            SignOptions::new("bob").expires_in(Duration::ZERO),
            ctx(),
        )
        .await
        .unwrap();
    let err = n
        .manager
        .read(&expired.access_token.0, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), SessionErrorKind::Expired);
    assert!(err.jwt_error().is_some());

    let fresh = n
        .manager
        .create(
            Map::new(),
            SignOptions::new("bob").expires_in(Duration::from_secs(60)),
            ctx(),
        )
        .await
        .unwrap();
    assert!(n.manager.read(&fresh.access_token.0, None).await.is_ok());
}

#[tokio::test]
async fn garbage_and_foreign_tokens_are_malformed() {
    let n = node(Arc::new(MemoryRefreshTokensStorage::new()));
    let err = n.manager.read("not-a-jwt", None).await.unwrap_err();
    assert_eq!(err.kind(), SessionErrorKind::Malformed);

    let other = node_with(
        Arc::new(MemoryRefreshTokensStorage::new()),
        JwtConfig::new(Secret::Hmac(b"another-secret".to_vec()), SignDefaults::default()),
    );
    let tokens = other
        .manager
        .create(Map::new(), SignOptions::new("bob"), ctx())
        .await
        .unwrap();
    let err = n
        .manager
        .read(&tokens.access_token.0, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), SessionErrorKind::Malformed);
}

#[tokio::test]
async fn deleting_one_session_leaves_the_others_alone() {
    let n = node(Arc::new(MemoryRefreshTokensStorage::new()));
    let subject = Subject::from("carol");
    let first = n
        .manager
        .create(Map::new(), SignOptions::new("carol"), ctx())
        .await
        .unwrap();
    let second = n
        .manager
        .create(Map::new(), SignOptions::new("carol"), ctx())
        .await
        .unwrap();

    let payload = n.manager.read(&first.access_token.0, None).await.unwrap();
    n.manager
        .delete_one(&subject, &first.refresh_token.0, &payload)
        .await
        .unwrap();

    let err = n
        .manager
        .read(&first.access_token.0, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), SessionErrorKind::Invalid);
    assert_eq!(
        err.to_string(),
        format!("Token '{}' was forcibly invalidated.", first.access_token.0)
    );
    assert!(n.manager.read(&second.access_token.0, None).await.is_ok());

    let sessions = n.manager.read_all(&subject).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert!(sessions.contains_key(&second.refresh_token.0));

    assert_eq!(
        n.events.take(),
        vec![JwtManagerEvent::SessionInvalidated { payload }]
    );
}

#[tokio::test]
async fn delete_all_spares_sessions_issued_afterwards() {
    let n = node(Arc::new(MemoryRefreshTokensStorage::new()));
    let subject = Subject::from("dave");
    let mut tokens = Vec::new();
    for _ in 0..3 {
        tokens.push(
            n.manager
                .create(Map::new(), SignOptions::new("dave"), ctx())
                .await
                .unwrap(),
        );
    }

    let payload = n.manager.read(&tokens[0].access_token.0, None).await.unwrap();
    let count = n.manager.delete_all(&subject, &payload).await.unwrap();
    assert_eq!(count, 3);
    for t in &tokens {
        let err = n.manager.read(&t.access_token.0, None).await.unwrap_err();
        assert_eq!(err.kind(), SessionErrorKind::Invalid);
    }
    assert!(n.manager.read_all(&subject).await.unwrap().is_empty());
    assert_eq!(
        n.events.take(),
        vec![JwtManagerEvent::AllSessionsInvalidated {
            subject: subject.clone(),
            access_token_ttl: 60,
        }]
    );

    // markers compare whole seconds against iat
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let later = n
        .manager
        .create(Map::new(), SignOptions::new("dave"), ctx())
        .await
        .unwrap();
    assert!(n.manager.read(&later.access_token.0, None).await.is_ok());
}

#[tokio::test]
async fn refreshing_with_an_unknown_token_is_not_found() {
    let n = node(Arc::new(MemoryRefreshTokensStorage::new()));
    let err = n
        .manager
        .update("nope", Map::new(), SignOptions::new("erin"), ctx())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), SessionErrorKind::NotFound);
    assert_eq!(
        err.to_string(),
        "Refresh token 'nope' for subject erin doesn't exist."
    );
}

#[tokio::test]
async fn refresh_is_bound_to_the_device() {
    let n = node(Arc::new(MemoryRefreshTokensStorage::new()));
    let laptop = ctx().with_device(Device::new("laptop", "ThinkPad"));
    let phone = ctx().with_device(Device::new("mobile", "Pixel"));
    let tokens = n
        .manager
        .create(Map::new(), SignOptions::new("frank"), laptop.clone())
        .await
        .unwrap();

    let refreshed = n
        .manager
        .update(
            &tokens.refresh_token.0,
            claims(),
            SignOptions::new("frank"),
            laptop,
        )
        .await
        .unwrap();
    let payload = n.manager.read(&refreshed.0, None).await.unwrap();
    assert_eq!(payload.anc, Anchor::of(&tokens.refresh_token.0));

    let err = n
        .manager
        .update(
            &tokens.refresh_token.0,
            Map::new(),
            SignOptions::new("frank"),
            phone,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), SessionErrorKind::ContextMismatch);

    // no device presented, no comparison
    assert!(
        n.manager
            .update(
                &tokens.refresh_token.0,
                Map::new(),
                SignOptions::new("frank"),
                ctx(),
            )
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn restrictions_replicate_to_a_peer_cache() {
    let storage: Arc<dyn RefreshTokensStorage> = Arc::new(MemoryRefreshTokensStorage::new());
    let a = node(storage.clone());
    let b = node(storage);
    let subject = Subject::from("grace");

    let tokens = a
        .manager
        .create(Map::new(), SignOptions::new("grace"), ctx())
        .await
        .unwrap();
    let payload = b.manager.read(&tokens.access_token.0, None).await.unwrap();

    a.manager
        .delete_one(&subject, &tokens.refresh_token.0, &payload)
        .await
        .unwrap();
    // the refresh token is gone for both, the marker only lives on a
    assert!(b.manager.read_all(&subject).await.unwrap().is_empty());
    assert!(b.manager.read(&tokens.access_token.0, None).await.is_ok());

    for event in a.events.take() {
        if let JwtManagerEvent::SessionInvalidated { payload } = event {
            b.manager.restrict_one(&payload).await.unwrap();
        }
    }
    let err = b
        .manager
        .read(&tokens.access_token.0, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), SessionErrorKind::Invalid);
    assert!(b.events.take().is_empty());
}

#[tokio::test]
async fn restriction_handler_skips_its_own_events() {
    let storage: Arc<dyn RefreshTokensStorage> = Arc::new(MemoryRefreshTokensStorage::new());
    let a = node(storage.clone());
    let b = node(storage);
    let handler = RestrictionHandler::new("node-b", b.manager.clone());

    let tokens = a
        .manager
        .create(Map::new(), SignOptions::new("heidi"), ctx())
        .await
        .unwrap();
    let payload = a.manager.read(&tokens.access_token.0, None).await.unwrap();
    let event = JwtManagerEvent::AllSessionsInvalidated {
        subject: payload.sub.clone(),
        access_token_ttl: payload.access_token_ttl().as_secs(),
    };

    let own = serde_json::to_vec(&ClusterEnvelope {
        origin: "node-b".to_string(),
        event: event.clone(),
    })
    .unwrap();
    assert_eq!(handler.handle(&own).await.unwrap(), HandleOutcome::SkipCommit);
    assert!(b.manager.read(&tokens.access_token.0, None).await.is_ok());

    assert_eq!(
        handler.handle(b"{not json").await.unwrap(),
        HandleOutcome::SkipCommit
    );

    let peer = serde_json::to_vec(&ClusterEnvelope {
        origin: "node-a".to_string(),
        event,
    })
    .unwrap();
    assert_eq!(handler.handle(&peer).await.unwrap(), HandleOutcome::Commit);
    let err = b
        .manager
        .read(&tokens.access_token.0, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), SessionErrorKind::Invalid);
}

#[tokio::test]
async fn refreshed_access_token_never_outlives_its_refresh_token() {
    let storage = Arc::new(MemoryRefreshTokensStorage::new());
    let strategy = RefreshTokenInvalidationStrategy::try_new(
        storage,
        Arc::new(MemoryInvalidAccessTokensCache::new()),
        StrategyConfig {
            refresh_token_ttl: Duration::from_secs(30),
            ..StrategyConfig::default()
        },
    )
    .unwrap();
    let manager = JwtSessionManager::try_new(
        config().with_access_ttl_cap(true),
        Arc::new(strategy),
        Arc::new(DiscardEventSink),
    )
    .unwrap();

    let tokens = manager
        .create(Map::new(), SignOptions::new("ivan"), ctx())
        .await
        .unwrap();
    let access = manager
        .update(
            &tokens.refresh_token.0,
            Map::new(),
            SignOptions::new("ivan").expires_in(Duration::from_secs(3600)),
            ctx(),
        )
        .await
        .unwrap();
    let payload = manager.read(&access.0, None).await.unwrap();
    assert!(payload.exp - payload.iat <= 30);
}

#[tokio::test]
async fn non_string_role_and_audience_round_trip() {
    let n = node(Arc::new(MemoryRefreshTokensStorage::new()));
    let custom = json!({"role": ["admin", "user"], "level": 7})
        .as_object()
        .cloned()
        .unwrap();
    let tokens = n
        .manager
        .create(custom, SignOptions::new("judy"), ctx())
        .await
        .unwrap();

    let payload = n.manager.read(&tokens.access_token.0, None).await.unwrap();
    assert_eq!(payload.role, Some(json!(["admin", "user"])));
    assert_eq!(payload.claims.get("level"), Some(&json!(7)));

    let numeric = json!({"role": 7}).as_object().cloned().unwrap();
    let tokens = n
        .manager
        .create(numeric, SignOptions::new("judy"), ctx())
        .await
        .unwrap();
    let payload = n.manager.read(&tokens.access_token.0, None).await.unwrap();
    assert_eq!(payload.role, Some(json!(7)));
}

#[tokio::test]
async fn deleted_refresh_token_is_not_found() {
    let n = node(Arc::new(MemoryRefreshTokensStorage::new()));
    let subject = Subject::from("kate");
    let first = n
        .manager
        .create(Map::new(), SignOptions::new("kate"), ctx())
        .await
        .unwrap();
    let second = n
        .manager
        .create(Map::new(), SignOptions::new("kate"), ctx())
        .await
        .unwrap();

    let payload = n.manager.read(&first.access_token.0, None).await.unwrap();
    n.manager
        .delete_one(&subject, &first.refresh_token.0, &payload)
        .await
        .unwrap();

    let err = n
        .manager
        .update(
            &first.refresh_token.0,
            Map::new(),
            SignOptions::new("kate"),
            ctx(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), SessionErrorKind::NotFound);
    assert_eq!(
        err.to_string(),
        format!(
            "Refresh token '{}' for subject kate doesn't exist.",
            first.refresh_token.0
        )
    );

    let refreshed = n
        .manager
        .update(
            &second.refresh_token.0,
            Map::new(),
            SignOptions::new("kate"),
            ctx(),
        )
        .await
        .unwrap();
    assert!(n.manager.read(&refreshed.0, None).await.is_ok());
}

#[tokio::test]
async fn delete_all_kills_old_refresh_tokens_only() {
    let n = node(Arc::new(MemoryRefreshTokensStorage::new()));
    let subject = Subject::from("leo");
    let old = n
        .manager
        .create(Map::new(), SignOptions::new("leo"), ctx())
        .await
        .unwrap();
    let payload = n.manager.read(&old.access_token.0, None).await.unwrap();
    assert_eq!(n.manager.delete_all(&subject, &payload).await.unwrap(), 1);

    let err = n
        .manager
        .update(&old.refresh_token.0, Map::new(), SignOptions::new("leo"), ctx())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), SessionErrorKind::NotFound);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let later = n
        .manager
        .create(Map::new(), SignOptions::new("leo"), ctx())
        .await
        .unwrap();
    let refreshed = n
        .manager
        .update(
            &later.refresh_token.0,
            Map::new(),
            SignOptions::new("leo"),
            ctx(),
        )
        .await
        .unwrap();
    let payload = n.manager.read(&refreshed.0, None).await.unwrap();
    assert_eq!(payload.anc, Anchor::of(&later.refresh_token.0));
}

/// A cache whose backend is unreachable.
struct UnreachableCache;

#[async_trait::async_trait]
impl InvalidAccessTokensCache for UnreachableCache {
    async fn upsert(
        &self,
        _key: &str,
        _invalidated_at: Option<i64>,
        _ttl: Duration,
    ) -> Result<(), SessionError> {
        Err(SessionError::Store("connection refused".to_string()))
    }

    async fn has(&self, _key: &str) -> Result<bool, SessionError> {
        Err(SessionError::Store("connection refused".to_string()))
    }

    async fn get(&self, _key: &str) -> Result<Option<Option<i64>>, SessionError> {
        Err(SessionError::Store("connection refused".to_string()))
    }
}

#[tokio::test]
async fn unreachable_cache_rejects_reads() {
    let strategy = RefreshTokenInvalidationStrategy::try_new(
        Arc::new(MemoryRefreshTokensStorage::new()),
        Arc::new(UnreachableCache),
        StrategyConfig::default(),
    )
    .unwrap();
    let events = Arc::new(RecordingEventSink::default());
    let manager = JwtSessionManager::try_new(config(), Arc::new(strategy), events.clone()).unwrap();

    let tokens = manager
        .create(Map::new(), SignOptions::new("mia"), ctx())
        .await
        .unwrap();
    let err = manager
        .read(&tokens.access_token.0, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), SessionErrorKind::Store);

    // a revocation that could not write its marker is reported, not announced
    let payload = IssuedJwtPayload {
        sub: Subject::from("mia"),
        iat: 0,
        exp: 60,
        anc: Anchor::of(&tokens.refresh_token.0),
        aud: None,
        iss: None,
        role: None,
        claims: Map::new(),
    };
    assert!(
        manager
            .delete_one(&payload.sub, &tokens.refresh_token.0, &payload)
            .await
            .is_err()
    );
    assert!(events.take().is_empty());
}
