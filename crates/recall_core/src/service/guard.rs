//! Per-key async mutation guards.

use super::ActionError;
use log::warn;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// At most one holder per key; idle slots are pruned on acquire.
#[derive(Default)]
pub(crate) struct KeyedLocks {
    slots: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    /// Waits up to `timeout` for exclusive access to `key`.
    pub(crate) async fn acquire(
        &self,
        key: Uuid,
        timeout: Duration,
    ) -> Result<OwnedMutexGuard<()>, ActionError> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            // A count of 1 means only the map references the slot.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(key).or_default())
        };

        match tokio::time::timeout(timeout, slot.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                let waited_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(
                    "event=mutation_guard module=service status=timeout note_id={key} waited_ms={waited_ms}"
                );
                Err(ActionError::Concurrency {
                    note_id: key,
                    waited_ms,
                })
            }
        }
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
