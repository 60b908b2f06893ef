//! Code cache statistics.
//!
//! All counters are atomic and may be read at any time without
//! stopping the world.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

/// Most recent fullness events retained for diagnostics.
const MAX_FULL_EVENTS: usize = 16;

/// Recorded when a heap first crosses its fullness threshold.
#[derive(Debug, Clone)]
pub struct CodeCacheFullEvent {
    /// Display name of the heap that filled up.
    pub heap: &'static str,
    /// Bytes still unallocated against the reservation at event time.
    pub unallocated: usize,
    /// When the event fired.
    pub at: Instant,
}

/// Statistics collected by the code cache.
#[derive(Debug, Default)]
pub struct CodeCacheStats {
    /// Successful blob allocations.
    pub allocations: AtomicU64,
    /// Bytes handed out to blobs.
    pub allocated_bytes: AtomicU64,
    /// Blobs returned to the free lists.
    pub frees: AtomicU64,
    /// Bytes returned to the free lists.
    pub freed_bytes: AtomicU64,
    /// On-demand commit expansions.
    pub expansions: AtomicU64,
    /// Blobs whose contents were committed and made executable.
    pub commits: AtomicU64,
    /// Methods transitioned to not-entrant.
    pub made_not_entrant: AtomicU64,
    /// Methods transitioned to zombie.
    pub made_zombie: AtomicU64,
    /// Zombies reclaimed by the sweeper.
    pub swept: AtomicU64,
    /// Times a heap hit its fullness threshold. Saturates.
    pub full_count: AtomicU64,

    full_events: Mutex<Vec<CodeCacheFullEvent>>,
}

impl CodeCacheStats {
    pub(crate) fn record_allocation(&self, bytes: usize) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.allocated_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_free(&self, bytes: usize) {
        self.frees.fetch_add(1, Ordering::Relaxed);
        self.freed_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_expansion(&self) {
        self.expansions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_not_entrant(&self, count: u64) {
        self.made_not_entrant.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_zombies(&self, count: u64) {
        self.made_zombie.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_swept(&self, count: u64) {
        self.swept.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_full(&self, event: CodeCacheFullEvent) {
        let _ = self
            .full_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_add(1))
            });
        let mut events = self.full_events.lock();
        if events.len() == MAX_FULL_EVENTS {
            events.remove(0);
        }
        events.push(event);
    }

    /// Retained fullness events, oldest first.
    pub fn full_events(&self) -> Vec<CodeCacheFullEvent> {
        self.full_events.lock().clone()
    }

    /// Print a summary of cache activity to stderr.
    pub fn print_summary(&self) {
        eprintln!("=== Code Cache Statistics ===");
        eprintln!(
            "Allocations:       {} ({} bytes)",
            self.allocations.load(Ordering::Relaxed),
            self.allocated_bytes.load(Ordering::Relaxed)
        );
        eprintln!(
            "Frees:             {} ({} bytes)",
            self.frees.load(Ordering::Relaxed),
            self.freed_bytes.load(Ordering::Relaxed)
        );
        eprintln!(
            "Commit expansions: {}",
            self.expansions.load(Ordering::Relaxed)
        );
        eprintln!(
            "Blob commits:      {}",
            self.commits.load(Ordering::Relaxed)
        );
        eprintln!(
            "Made not-entrant:  {}",
            self.made_not_entrant.load(Ordering::Relaxed)
        );
        eprintln!(
            "Made zombie:       {}",
            self.made_zombie.load(Ordering::Relaxed)
        );
        eprintln!("Swept:             {}", self.swept.load(Ordering::Relaxed));
        eprintln!(
            "Fullness events:   {}",
            self.full_count.load(Ordering::Relaxed)
        );
    }
}
