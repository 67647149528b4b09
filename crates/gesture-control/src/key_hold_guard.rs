use crate::{AppResult, KeyInjector};

use std::sync::Arc;

use enigo::Key;
use tracing::warn;

/// RAII guard that guarantees a held key is released when dropped.
///
/// Prevents a stuck key if the hold is interrupted by an error or panic.
/// Release is best-effort: a failure is logged, and the OS resets the key
/// state on the next physical press.
pub struct KeyHoldGuard {
    injector: Arc<dyn KeyInjector>,
    key: Key,
}

impl KeyHoldGuard {
    /// Press `key` and return a guard that will release it on drop.
    pub(crate) fn press(injector: Arc<dyn KeyInjector>, key: Key) -> AppResult<Self> {
        injector.press(key)?;
        Ok(Self { injector, key })
    }
}

impl Drop for KeyHoldGuard {
    fn drop(&mut self) {
        if let Err(e) = self.injector.release(self.key) {
            warn!(key = ?self.key, error = ?e, "Failed to release held key");
        }
    }
}
