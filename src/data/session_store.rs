//! Session store
//!
//! Maps session keys to user ids with store-managed expiry. The store is the
//! only authority on session liveness: callers never cache what it returns.

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use std::time::{Duration, Instant};

use super::models::UserId;
use crate::error::AppError;

/// Key-value session storage with per-entry time-to-live
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Look up a live session. Expired and unknown keys both yield `None`.
    async fn get(&self, key: &str) -> Result<Option<UserId>, AppError>;

    async fn set(&self, key: &str, user_id: UserId, ttl: Duration) -> Result<(), AppError>;

    async fn remove(&self, key: &str) -> Result<(), AppError>;
}

#[derive(Debug, Clone, Copy)]
struct SessionEntry {
    user_id: UserId,
    ttl: Duration,
}

struct SessionExpiry;

impl Expiry<String, SessionEntry> for SessionExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &SessionEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &SessionEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process session store backed by Moka
///
/// Entries expire after the ttl given to [`SessionStore::set`]; reads never
/// extend it. At the capacity bound the least recently used session is
/// evicted; a newly written session is always admitted.
pub struct MemorySessionStore {
    entries: Cache<String, SessionEntry>,
}

impl MemorySessionStore {
    /// Create a store holding at most `max_entries` live sessions.
    pub fn new(max_entries: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(SessionExpiry)
            .build();

        Self { entries }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<UserId>, AppError> {
        Ok(self.entries.get(key).await.map(|entry| entry.user_id))
    }

    async fn set(&self, key: &str, user_id: UserId, ttl: Duration) -> Result<(), AppError> {
        self.entries
            .insert(key.to_string(), SessionEntry { user_id, ttl })
            .await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        self.entries.invalidate(key).await;
        Ok(())
    }
}
