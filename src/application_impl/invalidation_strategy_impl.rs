use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use nanoid::nanoid;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StrategyConfig {
    pub refresh_token_length: usize,
    pub refresh_token_ttl: Duration,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            refresh_token_length: 64,
            refresh_token_ttl: Duration::from_secs(30 * 24 * 60 * 60), // 30 days
        }
    }
}

/// Anchors access tokens to persisted refresh tokens and revokes them
/// through markers in the invalid-access-token cache.
pub struct RefreshTokenInvalidationStrategy {
    storage: Arc<dyn RefreshTokensStorage>,
    cache: Arc<dyn InvalidAccessTokensCache>,
    config: StrategyConfig,
}

impl RefreshTokenInvalidationStrategy {
    pub fn try_new(
        storage: Arc<dyn RefreshTokensStorage>,
        cache: Arc<dyn InvalidAccessTokensCache>,
        config: StrategyConfig,
    ) -> Result<Self, SessionError> {
        if config.refresh_token_length < MIN_REFRESH_TOKEN_LENGTH {
            return Err(SessionError::NotAllowed(format!(
                "refresh token length must be at least {}, got {}",
                MIN_REFRESH_TOKEN_LENGTH, config.refresh_token_length
            )));
        }

        Ok(Self {
            storage,
            cache,
            config,
        })
    }

    #[inline]
    fn new_refresh_token(&self) -> AnchorableRefreshToken {
        let size = self.config.refresh_token_length;
        AnchorableRefreshToken::new(nanoid!(size))
    }
}

#[async_trait::async_trait]
impl InvalidationStrategy for RefreshTokenInvalidationStrategy {
    async fn generate_refresh_token(
        &self,
        subject: &Subject,
        context: &UserSessionOperationContext,
    ) -> Result<AnchorableRefreshToken, SessionError> {
        let refresh_token = self.new_refresh_token();
        let metadata = UserSessionMetaData::new(context.clone(), Utc::now());

        self.storage
            .insert(
                subject,
                &refresh_token.token,
                &metadata,
                self.config.refresh_token_ttl,
            )
            .await?;

        Ok(refresh_token)
    }

    async fn is_access_token_still_valid(
        &self,
        payload: &IssuedJwtPayload,
    ) -> Result<bool, SessionError> {
        let session_key = RevocationKey::session(&payload.sub, &payload.anc).to_string();
        if self.cache.has(&session_key).await? {
            return Ok(false);
        }

        let wildcard_key = RevocationKey::all_sessions(&payload.sub).to_string();
        match self.cache.get(&wildcard_key).await? {
            None => Ok(true),
            Some(Some(invalidated_at)) => Ok(invalidated_at < payload.iat),
            // a wildcard marker without a timestamp rejects everything
            Some(None) => Ok(false),
        }
    }

    async fn refresh_session(
        &self,
        subject: &Subject,
        refresh_token: &str,
        context: &UserSessionOperationContext,
    ) -> Result<RefreshedSession, SessionError> {
        let stored = self
            .storage
            .read(subject, refresh_token)
            .await?
            .ok_or_else(|| SessionError::NotFound {
                token: refresh_token.to_owned(),
                subject: subject.clone(),
            })?;

        if let (Some(known), Some(presented)) =
            (&stored.metadata.context.device, &context.device)
        {
            if known != presented {
                return Err(SessionError::ContextMismatch {
                    token: refresh_token.to_owned(),
                    subject: subject.clone(),
                });
            }
        }

        Ok(RefreshedSession {
            anchor: Anchor::of(refresh_token),
            refresh_token_expires_at: stored.expires_at,
        })
    }

    async fn invalidate_session(
        &self,
        subject: &Subject,
        refresh_token: &str,
        payload: &IssuedJwtPayload,
    ) -> Result<(), SessionError> {
        self.storage.delete(subject, refresh_token).await?;
        self.restrict_access_token(payload).await
    }

    async fn invalidate_all_sessions(
        &self,
        subject: &Subject,
        payload: &IssuedJwtPayload,
    ) -> Result<(u64, Duration), SessionError> {
        let count = self.storage.delete_all(subject).await?;
        let ttl = payload.access_token_ttl();
        self.restrict_all_access_tokens(subject, ttl).await?;
        Ok((count, ttl))
    }

    async fn restrict_access_token(&self, payload: &IssuedJwtPayload) -> Result<(), SessionError> {
        let key = RevocationKey::session(&payload.sub, &payload.anc).to_string();
        self.cache
            .upsert(&key, None, payload.access_token_ttl())
            .await
    }

    async fn restrict_all_access_tokens(
        &self,
        subject: &Subject,
        access_token_ttl: Duration,
    ) -> Result<(), SessionError> {
        let key = RevocationKey::all_sessions(subject).to_string();
        let now = Utc::now().timestamp();
        self.cache
            .upsert(&key, Some(now), access_token_ttl.max(Duration::from_secs(1)))
            .await
    }

    async fn list_active_sessions(
        &self,
        subject: &Subject,
    ) -> Result<BTreeMap<String, QueriedUserSessionMetaData>, SessionError> {
        let sessions = self
            .storage
            .read_all(subject)
            .await?
            .into_iter()
            .map(|stored| {
                (
                    stored.token,
                    QueriedUserSessionMetaData {
                        metadata: stored.metadata,
                        expires_at: stored.expires_at,
                    },
                )
            })
            .collect();
        Ok(sessions)
    }
}
