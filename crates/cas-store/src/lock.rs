use std::sync::Arc;
use std::time::Duration;

use cas_types::ObjectHash;
use tracing::error;

use crate::error::StoreResult;
use crate::traits::MetaStore;

/// Holds the [`MetaStore`] lock for one primary hash.
///
/// The lock is released when the guard is dropped: on success, on error
/// propagation, on panic unwinding, and when a scheduled write owning the
/// guard is cancelled before it runs.
pub struct KeyGuard {
    meta: Arc<dyn MetaStore>,
    primary: ObjectHash,
    held: bool,
}

impl KeyGuard {
    /// Block until the lock for `primary` is held.
    pub fn acquire(
        meta: Arc<dyn MetaStore>,
        primary: ObjectHash,
        timeout: Option<Duration>,
    ) -> StoreResult<Self> {
        meta.lock(&primary, timeout)?;
        Ok(Self {
            meta,
            primary,
            held: true,
        })
    }

    pub fn primary(&self) -> &ObjectHash {
        &self.primary
    }

    /// Release now and report the backend's answer.
    pub fn release(mut self) -> StoreResult<()> {
        self.held = false;
        self.meta.unlock(&self.primary)
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        if self.held {
            if let Err(e) = self.meta.unlock(&self.primary) {
                error!(hash = %self.primary.short_hex(), error = %e, "failed to release key lock");
            }
        }
    }
}

impl std::fmt::Debug for KeyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyGuard")
            .field("primary", &self.primary)
            .field("held", &self.held)
            .finish()
    }
}
