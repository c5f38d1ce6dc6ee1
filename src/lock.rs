//! The feed-update lock.
//!
//! GUI-triggered structural operations (edit, delete) and the feed-update
//! worker must not overlap. The worker holds this lock for the duration of
//! an update cycle; structural operations make a single non-blocking
//! attempt and abort with [`CoreError::LockBusy`] on contention; they are
//! never queued or retried.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::CoreError;

/// Cloneable handle to the shared update lock.
#[derive(Clone, Default)]
pub struct UpdateLock {
    inner: Arc<Mutex<()>>,
}

/// Guard proving exclusive access; release by dropping.
pub struct UpdateGuard {
    _guard: OwnedMutexGuard<()>,
}

impl UpdateLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking acquisition attempt.
    pub fn try_acquire(&self) -> Result<UpdateGuard, CoreError> {
        match Arc::clone(&self.inner).try_lock_owned() {
            Ok(guard) => Ok(UpdateGuard { _guard: guard }),
            Err(_) => Err(CoreError::LockBusy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_succeeds_when_free() {
        let lock = UpdateLock::new();
        assert!(lock.try_acquire().is_ok());
    }

    #[test]
    fn contention_fails_immediately() {
        let lock = UpdateLock::new();
        let _held = lock.try_acquire().unwrap();

        assert!(matches!(lock.try_acquire(), Err(CoreError::LockBusy)));
    }

    #[test]
    fn released_on_drop() {
        let lock = UpdateLock::new();
        {
            let _held = lock.try_acquire().unwrap();
        }
        assert!(lock.try_acquire().is_ok());
    }
}
