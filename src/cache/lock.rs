//! Mutex access that survives a panicking holder.
//!
//! The poison flag is logged and cleared; the guard is returned as usual.

use std::sync::{Mutex, MutexGuard};

pub(crate) trait LockRecover<T> {
    /// Lock, taking the guard out of a poison error if a holder panicked.
    fn lock_recover(&self, source: &'static str, op: &'static str) -> MutexGuard<'_, T>;
}

impl<T> LockRecover<T> for Mutex<T> {
    fn lock_recover(&self, source: &'static str, op: &'static str) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(|poisoned| {
            tracing::warn!(source, op, "Lock poisoned by a panicked holder, continuing");
            self.clear_poison();
            poisoned.into_inner()
        })
    }
}
