//! Parallel chunk-claimed iteration.
//!
//! GC worker threads divide a snapshot of work items among themselves by
//! atomically claiming fixed-size chunks of the index space. Each item
//! is visited exactly once; no coordination beyond one fetch-add per
//! chunk is needed, and workers that finish early simply claim more.

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default items claimed per fetch-add.
pub const DEFAULT_CLAIM_CHUNK: usize = 32;

/// Atomic chunk dispenser over `0..total`.
///
/// Shared by reference among worker threads; each call to [`claim`]
/// hands out the next unclaimed chunk until the range is exhausted.
///
/// [`claim`]: ParallelClaimer::claim
pub struct ParallelClaimer {
    next: AtomicUsize,
    total: usize,
    chunk: usize,
}

impl ParallelClaimer {
    /// Create a dispenser over `total` items with the given chunk size.
    pub fn new(total: usize, chunk: usize) -> Self {
        debug_assert!(chunk > 0);
        Self {
            next: AtomicUsize::new(0),
            total,
            chunk,
        }
    }

    /// Create a dispenser with the default chunk size.
    pub fn with_default_chunk(total: usize) -> Self {
        Self::new(total, DEFAULT_CLAIM_CHUNK)
    }

    /// Claim the next chunk of indices, or `None` when all are taken.
    pub fn claim(&self) -> Option<Range<usize>> {
        let start = self.next.fetch_add(self.chunk, Ordering::Relaxed);
        if start >= self.total {
            return None;
        }
        Some(start..(start + self.chunk).min(self.total))
    }
}
