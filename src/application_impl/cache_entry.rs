use crate::domain_model::UserId;
use std::time::Duration;
use tokio::time::Instant;

/// A cached collection value, valid for `ttl` from its fetch and only for
/// the user it was fetched for.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: Instant,
    pub ttl: Duration,
    pub user_id: UserId,
}

impl<T> CacheEntry<T> {
    pub fn new(user_id: UserId, value: T, ttl: Duration) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
            ttl,
            user_id,
        }
    }

    pub fn is_valid_for(&self, user_id: &UserId) -> bool {
        self.user_id == *user_id && self.fetched_at.elapsed() < self.ttl
    }

    pub fn belongs_to(&self, user_id: &UserId) -> bool {
        self.user_id == *user_id
    }
}
