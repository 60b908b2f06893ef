//! Parallel bucket claiming.
//!
//! Worker threads sweeping the table at a safepoint divide the bucket
//! array among themselves by atomically claiming fixed-size chunks.
//! Each bucket is processed by exactly one worker.

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default buckets claimed per fetch-add.
pub const CLAIM_CHUNK_SIZE: usize = 32;

/// Atomic chunk dispenser over a bucket index range.
pub struct BucketClaimer {
    next: AtomicUsize,
    total: usize,
    chunk: usize,
}

impl BucketClaimer {
    /// Create a dispenser over `total` buckets with the given chunk size.
    pub fn new(total: usize, chunk: usize) -> Self {
        debug_assert!(chunk > 0);
        Self {
            next: AtomicUsize::new(0),
            total,
            chunk,
        }
    }

    /// Claim the next chunk of bucket indices, or `None` when done.
    pub fn claim(&self) -> Option<Range<usize>> {
        let start = self.next.fetch_add(self.chunk, Ordering::Relaxed);
        if start >= self.total {
            return None;
        }
        Some(start..(start + self.chunk).min(self.total))
    }
}
