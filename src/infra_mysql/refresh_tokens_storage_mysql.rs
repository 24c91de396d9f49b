use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use std::time::Duration;

/// Refresh tokens in the `refresh_token` table (see `sql/refresh_token.sql`).
/// Rows past `expires_at` are ignored by every query.
pub struct MySqlRefreshTokensStorage {
    pool: MySqlPool,
}

impl MySqlRefreshTokensStorage {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlRefreshTokensStorage { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<StoredRefreshToken, SessionError> {
        let token: String = row
            .try_get("token")
            .map_err(|e| SessionError::Store(e.to_string()))?;
        let metadata_json: String = row
            .try_get("metadata_json")
            .map_err(|e| SessionError::Store(e.to_string()))?;
        let expires_at: DateTime<Utc> = row
            .try_get("expires_at")
            .map_err(|e| SessionError::Store(e.to_string()))?;

        let metadata = serde_json::from_str(&metadata_json)
            .map_err(|e| SessionError::Store(format!("corrupt metadata: {e}")))?;

        Ok(StoredRefreshToken {
            token,
            metadata,
            expires_at,
        })
    }
}

#[async_trait::async_trait]
impl RefreshTokensStorage for MySqlRefreshTokensStorage {
    async fn insert(
        &self,
        subject: &Subject,
        token: &str,
        metadata: &UserSessionMetaData,
        ttl: Duration,
    ) -> Result<(), SessionError> {
        let metadata_json =
            serde_json::to_string(metadata).map_err(|e| SessionError::InternalError(e.to_string()))?;
        let expires_at = Utc::now() + ttl;

        sqlx::query(
            r#"
INSERT INTO refresh_token (subject, token, metadata_json, created_at, expires_at)
VALUES (?, ?, ?, ?, ?)
ON DUPLICATE KEY UPDATE metadata_json = VALUES(metadata_json), expires_at = VALUES(expires_at)
"#,
        )
        .bind(subject.as_str())
        .bind(token)
        .bind(metadata_json)
        .bind(metadata.created_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::Store(e.to_string()))?;

        Ok(())
    }

    async fn read(
        &self,
        subject: &Subject,
        token: &str,
    ) -> Result<Option<StoredRefreshToken>, SessionError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT token, metadata_json, expires_at
FROM refresh_token
WHERE subject = ? AND token = ? AND expires_at > ?
"#,
        )
        .bind(subject.as_str())
        .bind(token)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SessionError::Store(e.to_string()))?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn read_all(&self, subject: &Subject) -> Result<Vec<StoredRefreshToken>, SessionError> {
        let rows = sqlx::query(
            r#"
SELECT token, metadata_json, expires_at
FROM refresh_token
WHERE subject = ? AND expires_at > ?
ORDER BY created_at ASC
"#,
        )
        .bind(subject.as_str())
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SessionError::Store(e.to_string()))?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn delete(&self, subject: &Subject, token: &str) -> Result<(), SessionError> {
        sqlx::query(
            r#"
DELETE FROM refresh_token
WHERE subject = ? AND token = ?
"#,
        )
        .bind(subject.as_str())
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::Store(e.to_string()))?;

        Ok(())
    }

    async fn delete_all(&self, subject: &Subject) -> Result<u64, SessionError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SessionError::Store(e.to_string()))?;

        let live = sqlx::query(
            r#"
DELETE FROM refresh_token
WHERE subject = ? AND expires_at > ?
"#,
        )
        .bind(subject.as_str())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| SessionError::Store(e.to_string()))?
        .rows_affected();

        // leftovers are already expired
        sqlx::query("DELETE FROM refresh_token WHERE subject = ?")
            .bind(subject.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| SessionError::Store(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| SessionError::Store(e.to_string()))?;

        Ok(live)
    }
}
