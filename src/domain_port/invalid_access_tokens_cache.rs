use crate::application_port::*;
use std::time::Duration;

/// TTL key/value cache holding revocation markers.
///
/// A marker value is either `None` (one session revoked) or the unix
/// timestamp at which every older token of the subject was revoked.
#[async_trait::async_trait]
pub trait InvalidAccessTokensCache: Send + Sync {
    async fn upsert(
        &self,
        key: &str,
        invalidated_at: Option<i64>,
        ttl: Duration,
    ) -> Result<(), SessionError>;

    async fn has(&self, key: &str) -> Result<bool, SessionError>;

    /// `None` when the key is absent, `Some(value)` otherwise.
    async fn get(&self, key: &str) -> Result<Option<Option<i64>>, SessionError>;
}
