//! Per-key gates that serialize misses, so concurrent callers missing on the
//! same key do the expensive work (opening, decoding) once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OwnedMutexGuard;

type Slot = Arc<tokio::sync::Mutex<()>>;

#[derive(Default)]
pub(crate) struct Gates {
    inflight: Mutex<HashMap<String, Slot>>,
}

impl Gates {
    /// Wait until no other caller holds the gate for `key`, then hold it
    /// until the returned guard is dropped.
    pub(crate) async fn enter(&self, key: &str) -> Gate<'_> {
        let slot = Arc::clone(self.lock().entry(key.to_string()).or_default());
        let guard = slot.lock_owned().await;
        Gate { gates: self, key: key.to_string(), guard: Some(guard) }
    }

    // Only ever held for map bookkeeping, never across an await.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}

pub(crate) struct Gate<'a> {
    gates: &'a Gates,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for Gate<'_> {
    fn drop(&mut self) {
        let mut inflight = self.gates.lock();
        // Release under the map lock so the reference count below is exact.
        drop(self.guard.take());
        if inflight.get(&self.key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            inflight.remove(&self.key);
        }
    }
}
