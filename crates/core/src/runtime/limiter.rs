use crate::config::TreeConfig;
use crate::error::{Result, SolscopeError};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds the number of concurrent outbound requests.
///
/// Constructed explicitly and handed to each consumer; there is no global
/// instance. [`RequestLimiter::clear`] fails every waiter and starts over.
pub struct RequestLimiter {
    permits: usize,
    semaphore: Mutex<Arc<Semaphore>>,
}

impl RequestLimiter {
    pub fn new(permits: usize) -> Self {
        let permits = permits.max(1);
        Self {
            permits,
            semaphore: Mutex::new(Arc::new(Semaphore::new(permits))),
        }
    }

    pub fn from_config(config: &TreeConfig) -> Self {
        Self::new(config.max_concurrent_requests)
    }

    fn current(&self) -> Result<Arc<Semaphore>> {
        self.semaphore
            .lock()
            .map(|s| s.clone())
            .map_err(|_| SolscopeError::Internal("request limiter poisoned".to_string()))
    }

    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        self.current()?
            .acquire_owned()
            .await
            .map_err(|_| SolscopeError::Limiter("request queue cleared".to_string()))
    }

    /// Runs `task` once a permit is available.
    pub async fn run<F>(&self, task: F) -> Result<F::Output>
    where
        F: Future,
    {
        let _permit = self.acquire().await?;
        Ok(task.await)
    }

    pub fn in_flight(&self) -> usize {
        self.current()
            .map(|s| self.permits.saturating_sub(s.available_permits()))
            .unwrap_or(0)
    }

    /// Rejects everything waiting for a permit and installs a fresh semaphore.
    pub fn clear(&self) {
        let Ok(mut semaphore) = self.semaphore.lock() else {
            return;
        };
        semaphore.close();
        *semaphore = Arc::new(Semaphore::new(self.permits));
        tracing::debug!("Request limiter cleared");
    }
}
