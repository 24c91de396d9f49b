use crate::application_port::*;
use crate::domain_port::*;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Every this many writes, expired markers are swept from the whole map.
const SWEEP_EVERY: usize = 256;

struct Marker {
    invalidated_at: Option<i64>,
    expires_at: Instant,
}

impl Marker {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Process-local marker cache with per-entry TTL. Expired markers are
/// evicted on lookup and by a periodic sweep on write.
#[derive(Default)]
pub struct MemoryInvalidAccessTokensCache {
    markers: DashMap<String, Marker>,
    writes: AtomicUsize,
}

impl MemoryInvalidAccessTokensCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, key: &str) -> Option<Option<i64>> {
        let now = Instant::now();
        self.markers.remove_if(key, |_, m| m.is_expired(now));
        self.markers.get(key).map(|m| m.invalidated_at)
    }

    fn sweep(&self) {
        let now = Instant::now();
        self.markers.retain(|_, m| !m.is_expired(now));
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

#[async_trait::async_trait]
impl InvalidAccessTokensCache for MemoryInvalidAccessTokensCache {
    async fn upsert(
        &self,
        key: &str,
        invalidated_at: Option<i64>,
        ttl: Duration,
    ) -> Result<(), SessionError> {
        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep();
        }
        self.markers.insert(
            key.to_owned(),
            Marker {
                invalidated_at,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, SessionError> {
        Ok(self.lookup(key).is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<Option<i64>>, SessionError> {
        Ok(self.lookup(key))
    }
}
