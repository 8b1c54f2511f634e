//! Non-overlap guard for a cycle.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Allows at most one in-flight tick of a cycle.
///
/// Clones share the same lock.
#[derive(Debug, Clone)]
pub struct CycleGuard {
    name: &'static str,
    lock: Arc<Mutex<()>>,
}

/// Held while a tick runs.
pub type CyclePermit = OwnedMutexGuard<()>;

impl CycleGuard {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Cycle name used in log fields.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Claim the cycle, or `None` when a tick is already running.
    pub fn try_enter(&self) -> Option<CyclePermit> {
        self.lock.clone().try_lock_owned().ok()
    }

    /// Whether a tick currently holds the guard.
    pub fn is_busy(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    /// Wait until no tick holds the guard.
    pub async fn wait_idle(&self) {
        let _idle = self.lock.lock().await;
    }
}
