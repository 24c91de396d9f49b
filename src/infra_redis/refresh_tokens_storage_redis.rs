use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{Duration as ChronoDuration, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

/// One `SET EX` key per refresh token holding its JSON metadata, plus a
/// per-subject index set used to list and bulk-delete sessions.
pub struct RedisRefreshTokensStorage {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisRefreshTokensStorage {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisRefreshTokensStorage {
            conn,
            prefix: prefix.into(),
        }
    }

    fn token_key(&self, subject: &Subject, token: &str) -> String {
        format!("{}:session:{}:{}", self.prefix, subject, token)
    }

    fn index_key(&self, subject: &Subject) -> String {
        format!("{}:subject:{}", self.prefix, subject)
    }

    async fn read_token(
        &self,
        conn: &mut ConnectionManager,
        subject: &Subject,
        token: &str,
    ) -> Result<Option<StoredRefreshToken>, SessionError> {
        let key = self.token_key(subject, token);
        let (value, ttl): (Option<String>, i64) = redis::pipe()
            .get(&key)
            .ttl(&key)
            .query_async(conn)
            .await
            .map_err(|e| SessionError::Store(e.to_string()))?;

        // ttl is -2 once the key is gone
        let (Some(value), true) = (value, ttl >= 0) else {
            return Ok(None);
        };
        let metadata: UserSessionMetaData =
            serde_json::from_str(&value).map_err(|e| SessionError::Store(e.to_string()))?;

        Ok(Some(StoredRefreshToken {
            token: token.to_owned(),
            metadata,
            expires_at: Utc::now() + ChronoDuration::seconds(ttl),
        }))
    }
}

#[async_trait::async_trait]
impl RefreshTokensStorage for RedisRefreshTokensStorage {
    async fn insert(
        &self,
        subject: &Subject,
        token: &str,
        metadata: &UserSessionMetaData,
        ttl: Duration,
    ) -> Result<(), SessionError> {
        let value =
            serde_json::to_string(metadata).map_err(|e| SessionError::InternalError(e.to_string()))?;
        let secs = ttl.as_secs().max(1);
        let index = self.index_key(subject);

        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .set_ex(self.token_key(subject, token), value, secs)
            .ignore()
            .sadd(&index, token)
            .ignore()
            .expire(&index, secs as i64)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| SessionError::Store(e.to_string()))?;
        Ok(())
    }

    async fn read(
        &self,
        subject: &Subject,
        token: &str,
    ) -> Result<Option<StoredRefreshToken>, SessionError> {
        let mut conn = self.conn.clone();
        self.read_token(&mut conn, subject, token).await
    }

    async fn read_all(&self, subject: &Subject) -> Result<Vec<StoredRefreshToken>, SessionError> {
        let index = self.index_key(subject);
        let mut conn = self.conn.clone();
        let tokens: Vec<String> = conn
            .smembers(&index)
            .await
            .map_err(|e| SessionError::Store(e.to_string()))?;

        let mut sessions = Vec::with_capacity(tokens.len());
        let mut stale = Vec::new();
        for token in tokens {
            match self.read_token(&mut conn, subject, &token).await? {
                Some(stored) => sessions.push(stored),
                None => stale.push(token),
            }
        }

        if !stale.is_empty() {
            let _: () = conn
                .srem(&index, stale)
                .await
                .map_err(|e| SessionError::Store(e.to_string()))?;
        }
        Ok(sessions)
    }

    async fn delete(&self, subject: &Subject, token: &str) -> Result<(), SessionError> {
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .del(self.token_key(subject, token))
            .ignore()
            .srem(self.index_key(subject), token)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| SessionError::Store(e.to_string()))?;
        Ok(())
    }

    async fn delete_all(&self, subject: &Subject) -> Result<u64, SessionError> {
        let index = self.index_key(subject);
        let mut conn = self.conn.clone();
        let tokens: Vec<String> = conn
            .smembers(&index)
            .await
            .map_err(|e| SessionError::Store(e.to_string()))?;

        let keys: Vec<String> = tokens
            .iter()
            .map(|token| self.token_key(subject, token))
            .collect();

        if keys.is_empty() {
            let _: () = conn
                .del(&index)
                .await
                .map_err(|e| SessionError::Store(e.to_string()))?;
            return Ok(0);
        }

        let (removed,): (u64,) = redis::pipe()
            .atomic()
            .del(keys)
            .del(&index)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| SessionError::Store(e.to_string()))?;
        Ok(removed)
    }
}
