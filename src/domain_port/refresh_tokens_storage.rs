use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredRefreshToken {
    pub token: String,
    pub metadata: UserSessionMetaData,
    pub expires_at: DateTime<Utc>,
}

/// Persistent `(subject, refresh token) -> metadata` mapping with TTL.
/// Expired entries must read as absent.
#[async_trait::async_trait]
pub trait RefreshTokensStorage: Send + Sync {
    async fn insert(
        &self,
        subject: &Subject,
        token: &str,
        metadata: &UserSessionMetaData,
        ttl: Duration,
    ) -> Result<(), SessionError>;

    async fn read(
        &self,
        subject: &Subject,
        token: &str,
    ) -> Result<Option<StoredRefreshToken>, SessionError>;

    async fn read_all(&self, subject: &Subject) -> Result<Vec<StoredRefreshToken>, SessionError>;

    async fn delete(&self, subject: &Subject, token: &str) -> Result<(), SessionError>;

    /// Returns how many live entries were removed.
    async fn delete_all(&self, subject: &Subject) -> Result<u64, SessionError>;
}
