//! URLs waiting for the user to pick a quality.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// How long a format keyboard stays usable.
pub const PENDING_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone)]
struct PendingSelection {
    url: String,
    created_at: Instant,
}

/// One pending URL per user; a newer URL replaces the older one.
#[derive(Debug)]
pub struct PendingUrls {
    ttl: Duration,
    entries: Mutex<HashMap<i64, PendingSelection>>,
}

impl PendingUrls {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, user_id: i64, url: String) {
        self.entries.lock().await.insert(
            user_id,
            PendingSelection {
                url,
                created_at: Instant::now(),
            },
        );
    }

    /// Remove and return the user's pending URL unless it has expired.
    pub async fn take(&self, user_id: i64) -> Option<String> {
        let entry = self.entries.lock().await.remove(&user_id)?;
        (entry.created_at.elapsed() <= self.ttl).then_some(entry.url)
    }

    /// Drop expired entries.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, e| e.created_at.elapsed() <= self.ttl);
        before - entries.len()
    }
}

impl Default for PendingUrls {
    fn default() -> Self {
        Self::new(PENDING_TTL)
    }
}
