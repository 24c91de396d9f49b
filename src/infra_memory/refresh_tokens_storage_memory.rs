use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::time::Duration;

struct Entry {
    metadata: UserSessionMetaData,
    expires_at: DateTime<Utc>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Process-local refresh token store. Expired entries read as absent and
/// are dropped on the next access to their subject.
#[derive(Default)]
pub struct MemoryRefreshTokensStorage {
    subjects: DashMap<Subject, HashMap<String, Entry>>,
}

impl MemoryRefreshTokensStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RefreshTokensStorage for MemoryRefreshTokensStorage {
    async fn insert(
        &self,
        subject: &Subject,
        token: &str,
        metadata: &UserSessionMetaData,
        ttl: Duration,
    ) -> Result<(), SessionError> {
        let entry = Entry {
            metadata: metadata.clone(),
            expires_at: Utc::now() + ttl,
        };
        self.subjects
            .entry(subject.clone())
            .or_default()
            .insert(token.to_owned(), entry);
        Ok(())
    }

    async fn read(
        &self,
        subject: &Subject,
        token: &str,
    ) -> Result<Option<StoredRefreshToken>, SessionError> {
        let now = Utc::now();
        let Some(mut sessions) = self.subjects.get_mut(subject) else {
            return Ok(None);
        };
        sessions.retain(|_, e| e.is_live(now));

        Ok(sessions.get(token).map(|e| StoredRefreshToken {
            token: token.to_owned(),
            metadata: e.metadata.clone(),
            expires_at: e.expires_at,
        }))
    }

    async fn read_all(&self, subject: &Subject) -> Result<Vec<StoredRefreshToken>, SessionError> {
        let now = Utc::now();
        let Some(mut sessions) = self.subjects.get_mut(subject) else {
            return Ok(Vec::new());
        };
        sessions.retain(|_, e| e.is_live(now));

        Ok(sessions
            .iter()
            .map(|(token, e)| StoredRefreshToken {
                token: token.clone(),
                metadata: e.metadata.clone(),
                expires_at: e.expires_at,
            })
            .collect())
    }

    async fn delete(&self, subject: &Subject, token: &str) -> Result<(), SessionError> {
        if let Some(mut sessions) = self.subjects.get_mut(subject) {
            sessions.remove(token);
        }
        self.subjects.remove_if(subject, |_, sessions| sessions.is_empty());
        Ok(())
    }

    async fn delete_all(&self, subject: &Subject) -> Result<u64, SessionError> {
        let now = Utc::now();
        let removed = self
            .subjects
            .remove(subject)
            .map(|(_, sessions)| sessions.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0);
        Ok(removed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv6Addr};

    fn metadata() -> UserSessionMetaData {
        UserSessionMetaData::new(
            UserSessionOperationContext::new(IpAddr::V6(Ipv6Addr::LOCALHOST)),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn insert_read_delete() {
        let store = MemoryRefreshTokensStorage::new();
        let subject = Subject::from("alice");

        store
            .insert(&subject, "token-a", &metadata(), Duration::from_secs(60))
            .await
            .unwrap();
        let stored = store.read(&subject, "token-a").await.unwrap().unwrap();
        assert_eq!(stored.token, "token-a");
        assert!(stored.expires_at > Utc::now());

        assert!(
            store
                .read(&Subject::from("bob"), "token-a")
                .await
                .unwrap()
                .is_none()
        );

        store.delete(&subject, "token-a").await.unwrap();
        assert!(store.read(&subject, "token-a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_the_last_session_drops_the_subject() {
        let store = MemoryRefreshTokensStorage::new();
        let subject = Subject::from("alice");
        for token in ["token-a", "token-b"] {
            store
                .insert(&subject, token, &metadata(), Duration::from_secs(60))
                .await
                .unwrap();
        }

        store.delete(&subject, "token-a").await.unwrap();
        assert!(store.subjects.contains_key(&subject));

        store.delete(&subject, "token-b").await.unwrap();
        assert!(!store.subjects.contains_key(&subject));
    }

    #[tokio::test]
    async fn expired_entries_are_absent() {
        let store = MemoryRefreshTokensStorage::new();
        let subject = Subject::from("alice");
        store
            .insert(&subject, "short", &metadata(), Duration::ZERO)
            .await
            .unwrap();
        store
            .insert(&subject, "long", &metadata(), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(store.read(&subject, "short").await.unwrap().is_none());
        assert_eq!(store.read_all(&subject).await.unwrap().len(), 1);
        assert_eq!(store.delete_all(&subject).await.unwrap(), 1);
        assert!(store.read_all(&subject).await.unwrap().is_empty());
    }
}
