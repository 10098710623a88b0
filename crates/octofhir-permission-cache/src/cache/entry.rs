//! Timestamped cache values.

use std::time::Duration;

use tokio::time::Instant;

/// A cached value with its creation and expiry instants.
///
/// Entries are immutable: updating a key means storing a new entry.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The cached value.
    pub data: T,

    /// When the entry was created.
    pub created_at: Instant,

    /// When the entry stops being served.
    pub expires_at: Instant,
}

impl<T> CacheEntry<T> {
    /// Wrap `data` with an expiry `ttl` from now.
    pub fn new(data: T, ttl: Duration) -> Self {
        let created_at = Instant::now();
        Self {
            data,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    /// Returns `true` once `now` has reached the expiry instant.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Returns `true` if the entry has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Time since the entry was created.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}
