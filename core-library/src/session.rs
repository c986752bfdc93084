//! Single-writer guard for reconciliation sessions.
//!
//! A store hands out at most one [`SessionLease`] at a time. The lease is
//! released when dropped, so a session that errors or panics frees the store.

use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock shared by every handle to the same persistent store.
#[derive(Clone, Default)]
pub struct SessionLock {
    inner: Arc<Mutex<()>>,
}

impl SessionLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lease without waiting. `None` means a session is running.
    pub fn try_acquire(&self) -> Option<SessionLease> {
        Arc::clone(&self.inner)
            .try_lock_owned()
            .ok()
            .map(|guard| SessionLease { _guard: guard })
    }

    pub fn is_held(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

impl fmt::Debug for SessionLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionLock")
            .field("held", &self.is_held())
            .finish()
    }
}

/// Proof that the holder is the only active session on a store.
pub struct SessionLease {
    _guard: OwnedMutexGuard<()>,
}

impl fmt::Debug for SessionLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionLease")
    }
}
