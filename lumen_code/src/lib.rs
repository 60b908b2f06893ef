//! Executable-memory cache for the Lumen VM.
//!
//! The code cache owns the virtual-memory reservation that holds all
//! JIT-compiled code and VM-internal stubs. It provides:
//!
//! - Segmented code heaps (non-method / profiled / non-profiled) carved
//!   from a single contiguous reservation, or one unsegmented heap
//! - Segment-granular allocation with free-list reuse and on-demand
//!   commit growth
//! - A lock-free address-to-blob index safe to consult from signal
//!   handlers (the segment map is append-only and never relocated)
//! - The compiled-method liveness state machine
//!   (alive → not-entrant → zombie → freed) with idempotent
//!   deoptimization marking
//! - Parallel chunk-claimed iteration for GC worker threads
//! - One-time capacity-exhaustion reporting with recorded events
//!
//! # Locking
//!
//! All mutating operations take the single cache-wide allocation lock or
//! a [`Safepoint`] token. `find_blob` is lock-free by design and remains
//! correct from arbitrary contexts.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod blob;
pub mod cache;
pub mod config;
pub mod heap;
pub mod iter;
pub mod memory;
pub mod safepoint;
pub mod stats;

pub use blob::{BlobHandle, BlobKind, BlobRef, BlobState};
pub use cache::{CodeCache, CodeCacheError};
pub use config::{CodeCacheConfig, ConfigError};
pub use heap::HeapKind;
pub use iter::ParallelClaimer;
pub use safepoint::Safepoint;
pub use stats::{CodeCacheFullEvent, CodeCacheStats};
