use super::SessionError;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RefreshedSession {
    pub anchor: Anchor,
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// Session semantics below the manager, independent of JWT mechanics.
#[async_trait::async_trait]
pub trait InvalidationStrategy: Send + Sync {
    async fn generate_refresh_token(
        &self,
        subject: &Subject,
        context: &UserSessionOperationContext,
    ) -> Result<AnchorableRefreshToken, SessionError>;

    /// Cache-only check; never reaches the refresh token store.
    async fn is_access_token_still_valid(
        &self,
        payload: &IssuedJwtPayload,
    ) -> Result<bool, SessionError>;

    async fn refresh_session(
        &self,
        subject: &Subject,
        refresh_token: &str,
        context: &UserSessionOperationContext,
    ) -> Result<RefreshedSession, SessionError>;

    async fn invalidate_session(
        &self,
        subject: &Subject,
        refresh_token: &str,
        payload: &IssuedJwtPayload,
    ) -> Result<(), SessionError>;

    /// Returns the number of removed sessions and the marker TTL.
    async fn invalidate_all_sessions(
        &self,
        subject: &Subject,
        payload: &IssuedJwtPayload,
    ) -> Result<(u64, Duration), SessionError>;

    async fn restrict_access_token(&self, payload: &IssuedJwtPayload) -> Result<(), SessionError>;

    async fn restrict_all_access_tokens(
        &self,
        subject: &Subject,
        access_token_ttl: Duration,
    ) -> Result<(), SessionError>;

    async fn list_active_sessions(
        &self,
        subject: &Subject,
    ) -> Result<BTreeMap<String, QueriedUserSessionMetaData>, SessionError>;
}
