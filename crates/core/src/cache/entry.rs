//! A cached query result and its expiry rule.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::clock::to_time_delta;
use crate::model::Book;

/// Books cached under a query fingerprint.
///
/// Never served once `now > created_at + ttl`.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub value: Vec<Book>,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, value: Vec<Book>, created_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self { key: key.into(), value, created_at, ttl }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at
            .checked_add_signed(to_time_delta(self.ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }
}
