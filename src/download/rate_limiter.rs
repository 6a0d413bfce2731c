//! Per-platform concurrency limits for downloads.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};

use crate::error::DownloadError;
use crate::extractors::Platform;

/// Per-platform rate limiter using semaphores.
///
/// At most `per_platform_limit` downloads run concurrently against any one
/// platform.
#[derive(Debug)]
pub struct PlatformLimiter {
    per_platform_limit: usize,
    semaphores: RwLock<HashMap<Platform, Arc<Semaphore>>>,
}

impl PlatformLimiter {
    #[must_use]
    pub fn new(per_platform_limit: usize) -> Self {
        Self {
            per_platform_limit,
            semaphores: RwLock::new(HashMap::new()),
        }
    }

    /// Acquire a permit for the given platform, waiting until one is free.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ShuttingDown`] once the limiter is closed.
    pub async fn acquire(&self, platform: Platform) -> Result<PlatformPermit, DownloadError> {
        let semaphore = self.get_or_create_semaphore(platform).await;
        // Owned permit so it is not tied to the semaphore reference
        let permit = semaphore
            .acquire_owned()
            .await
            .map_err(|_| DownloadError::ShuttingDown)?;

        Ok(PlatformPermit {
            platform,
            _permit: permit,
        })
    }

    /// Try to acquire a permit without waiting.
    pub async fn try_acquire(&self, platform: Platform) -> Option<PlatformPermit> {
        let semaphore = self.get_or_create_semaphore(platform).await;
        semaphore
            .try_acquire_owned()
            .ok()
            .map(|permit| PlatformPermit {
                platform,
                _permit: permit,
            })
    }

    /// Close every semaphore; waiting and future acquires fail.
    pub async fn close(&self) {
        for semaphore in self.semaphores.read().await.values() {
            semaphore.close();
        }
    }

    async fn get_or_create_semaphore(&self, platform: Platform) -> Arc<Semaphore> {
        // Fast path: check if semaphore exists
        {
            let read_guard = self.semaphores.read().await;
            if let Some(sem) = read_guard.get(&platform) {
                return Arc::clone(sem);
            }
        }

        let mut write_guard = self.semaphores.write().await;
        // Another task may have created it between the two locks
        Arc::clone(
            write_guard
                .entry(platform)
                .or_insert_with(|| Arc::new(Semaphore::new(self.per_platform_limit))),
        )
    }
}

/// A download slot for a platform, released on drop.
#[derive(Debug)]
pub struct PlatformPermit {
    platform: Platform,
    _permit: OwnedSemaphorePermit,
}

impl PlatformPermit {
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }
}
