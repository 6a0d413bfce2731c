//! Per-user request quota using governor's keyed GCRA limiter.

use std::num::NonZeroU32;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

/// Limits how many downloads each user may start per minute.
#[derive(Debug)]
pub struct UserRateLimiter {
    limiter: DefaultKeyedRateLimiter<i64>,
}

impl UserRateLimiter {
    /// Allow `per_minute` requests per user, all of which may arrive in a burst.
    #[must_use]
    pub fn new(per_minute: NonZeroU32) -> Self {
        Self {
            limiter: RateLimiter::keyed(Quota::per_minute(per_minute)),
        }
    }

    /// Take one request from the user's quota. Returns `false` when exhausted.
    pub fn check(&self, user_id: i64) -> bool {
        self.limiter.check_key(&user_id).is_ok()
    }

    /// Forget users whose quota has fully recovered.
    pub fn prune(&self) {
        self.limiter.retain_recent();
    }

    #[must_use]
    pub fn tracked_users(&self) -> usize {
        self.limiter.len()
    }
}
