//! Safepoint proof token.
//!
//! Operations that mutate shared structures non-atomically (bulk state
//! transitions, sweeping, unloading) must only run while mutator threads
//! are stopped. Rather than trusting callers, those entry points demand
//! a [`Safepoint`] token by reference; constructing one acquires the
//! process-wide safepoint lock, so at most one safepoint operation runs
//! at a time and the requirement is visible in every signature.

use parking_lot::{Mutex, MutexGuard};

static SAFEPOINT_LOCK: Mutex<()> = Mutex::new(());

/// Proof that the caller is inside a stop-the-world pause.
///
/// Only one token exists at a time; a second `begin()` blocks until the
/// first token is dropped.
pub struct Safepoint {
    _guard: MutexGuard<'static, ()>,
}

impl Safepoint {
    /// Enter a safepoint, blocking until any other safepoint ends.
    pub fn begin() -> Safepoint {
        Safepoint {
            _guard: SAFEPOINT_LOCK.lock(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safepoints_are_exclusive() {
        let sp = Safepoint::begin();
        assert!(SAFEPOINT_LOCK.try_lock().is_none());
        drop(sp);
        assert!(SAFEPOINT_LOCK.try_lock().is_some());
    }
}
