//! Semaphore bulkhead

use crate::config::BulkheadConfig;
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Concurrency bulkhead for one envelope key.
///
/// Overflowing calls fail immediately with [`Error::BulkheadFull`] rather
/// than queueing; a slow downstream must not absorb the caller's threads.
pub struct Bulkhead {
    key: String,
    max_concurrent_calls: u32,
    semaphore: Arc<Semaphore>,
}

impl Bulkhead {
    /// Create a bulkhead with `max_concurrent_calls` permits
    pub fn new(key: impl Into<String>, config: BulkheadConfig) -> Self {
        Self {
            key: key.into(),
            max_concurrent_calls: config.max_concurrent_calls,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_calls as usize)),
        }
    }

    /// Take a permit without waiting
    pub fn try_acquire(&self) -> Result<OwnedSemaphorePermit> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .map_err(|_| Error::BulkheadFull {
                key: self.key.clone(),
                max_concurrent_calls: self.max_concurrent_calls,
            })
    }

    /// Permits currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permits_are_bounded() {
        let bulkhead = Bulkhead::new(
            "core-banking",
            BulkheadConfig {
                max_concurrent_calls: 2,
            },
        );

        let p1 = bulkhead.try_acquire().unwrap();
        let _p2 = bulkhead.try_acquire().unwrap();
        assert!(matches!(
            bulkhead.try_acquire(),
            Err(Error::BulkheadFull { .. })
        ));

        drop(p1);
        assert!(bulkhead.try_acquire().is_ok());
    }
}
