use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::SlotError;

/// Serializes read-filter-write generation runs per doctor within this process.
/// The `(doctor_id, slot_date, start_time)` unique constraint covers other processes.
#[derive(Clone)]
pub struct DoctorLocks {
    inner: Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>,
    timeout: Duration,
}

impl Default for DoctorLocks {
    fn default() -> Self {
        Self::new(Duration::from_millis(5000))
    }
}

impl DoctorLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    /// Waits up to the configured timeout, then gives up with a retryable conflict.
    pub async fn acquire(&self, doctor_id: Uuid) -> Result<OwnedMutexGuard<()>, SlotError> {
        let lock = {
            let mut locks = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Drop entries nobody holds or waits on.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(doctor_id).or_default().clone()
        };

        match tokio::time::timeout(self.timeout, lock.lock_owned()).await {
            Ok(guard) => {
                debug!("Acquired generation lock for doctor {}", doctor_id);
                Ok(guard)
            }
            Err(_) => {
                warn!("Timed out waiting for generation lock of doctor {}", doctor_id);
                Err(SlotError::ConcurrentGenerationConflict(doctor_id))
            }
        }
    }

    pub fn tracked(&self) -> usize {
        self.inner.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}
