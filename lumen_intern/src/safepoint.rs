//! Safepoint proof token.
//!
//! Table maintenance (sweeping, rehashing) restructures bucket chains
//! non-atomically and must only run while mutator threads are stopped.
//! Those entry points demand a [`Safepoint`] token by reference;
//! constructing one acquires the process-wide safepoint lock, so the
//! requirement is visible in every signature and at most one safepoint
//! operation runs at a time.

use parking_lot::{Mutex, MutexGuard};

static SAFEPOINT_LOCK: Mutex<()> = Mutex::new(());

/// Proof that the caller is inside a stop-the-world pause.
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
