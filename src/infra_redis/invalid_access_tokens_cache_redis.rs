use crate::application_port::*;
use crate::domain_port::*;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

/// Markers stored as JSON (`null` or a unix timestamp) under `SET EX`.
pub struct RedisInvalidAccessTokensCache {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisInvalidAccessTokensCache {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisInvalidAccessTokensCache {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait::async_trait]
impl InvalidAccessTokensCache for RedisInvalidAccessTokensCache {
    async fn upsert(
        &self,
        key: &str,
        invalidated_at: Option<i64>,
        ttl: Duration,
    ) -> Result<(), SessionError> {
        let value = serde_json::to_string(&invalidated_at)
            .map_err(|e| SessionError::InternalError(e.to_string()))?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(self.key(key), value, ttl.as_secs().max(1))
            .await
            .map_err(|e| SessionError::Store(e.to_string()))?;
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, SessionError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn
            .exists(self.key(key))
            .await
            .map_err(|e| SessionError::Store(e.to_string()))?;
        Ok(exists)
    }

    async fn get(&self, key: &str) -> Result<Option<Option<i64>>, SessionError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(self.key(key))
            .await
            .map_err(|e| SessionError::Store(e.to_string()))?;

        value
            .map(|v| serde_json::from_str::<Option<i64>>(&v))
            .transpose()
            .map_err(|e| SessionError::Store(format!("corrupt marker '{}': {}", key, e)))
    }
}
