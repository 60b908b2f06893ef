//! Code blobs: kinds, liveness states, handles, and packed records.
//!
//! The kind set is closed, so a tagged enum carries it instead of a
//! class hierarchy. Reader-visible blob metadata (kind, length,
//! liveness) is packed into one atomic word per blob so the lock-free
//! address index can take a consistent snapshot with a single load.

use smallvec::SmallVec;

// =============================================================================
// Blob kind
// =============================================================================

/// Classification of a code blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    /// VM-internal runtime stub.
    Stub,
    /// Calling-convention adapter.
    Adapter,
    /// Deoptimization handler blob.
    DeoptHandler,
    /// Scratch buffer for the compiler backend.
    Buffer,
    /// Compiled method code; `profiled` selects the method heap tier.
    Method {
        /// Whether the method carries profiling instrumentation.
        profiled: bool,
    },
}

impl BlobKind {
    /// Whether this kind is compiled-method code.
    #[inline]
    pub fn is_method(self) -> bool {
        matches!(self, BlobKind::Method { .. })
    }

    /// Whether this kind is a calling-convention adapter.
    #[inline]
    pub fn is_adapter(self) -> bool {
        matches!(self, BlobKind::Adapter)
    }

    pub(crate) fn code(self) -> u64 {
        match self {
            BlobKind::Stub => 1,
            BlobKind::Adapter => 2,
            BlobKind::DeoptHandler => 3,
            BlobKind::Buffer => 4,
            BlobKind::Method { profiled: true } => 5,
            BlobKind::Method { profiled: false } => 6,
        }
    }

    pub(crate) fn from_code(code: u64) -> Option<BlobKind> {
        match code {
            1 => Some(BlobKind::Stub),
            2 => Some(BlobKind::Adapter),
            3 => Some(BlobKind::DeoptHandler),
            4 => Some(BlobKind::Buffer),
            5 => Some(BlobKind::Method { profiled: true }),
            6 => Some(BlobKind::Method { profiled: false }),
            _ => None,
        }
    }
}

// =============================================================================
// Liveness state
// =============================================================================

/// Liveness state of a compiled-method blob.
///
/// Transitions run forward only: alive → not-entrant → zombie, with a
/// permitted alive → zombie shortcut for code that was never published
/// to a call site. The `unloaded` flag is orthogonal and tracked on the
/// record, not here.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BlobState {
    /// Entrant and executable.
    Alive = 0,
    /// New activations are forbidden; frames may still be executing it.
    NotEntrant = 1,
    /// Unreachable from any activation, pending reclamation.
    Zombie = 2,
}

impl BlobState {
    pub(crate) fn from_bits(bits: u64) -> BlobState {
        match bits {
            0 => BlobState::Alive,
            1 => BlobState::NotEntrant,
            _ => BlobState::Zombie,
        }
    }
}

// =============================================================================
// Packed record
// =============================================================================

// Record layout, one word per blob start segment:
//   bits  0..32  length in segments
//   bits 32..36  kind code (0 = no blob starts here)
//   bits 36..38  liveness state
//   bit  38      committed (contents fully written)
//   bit  39      unloaded
const LEN_MASK: u64 = 0xFFFF_FFFF;
const KIND_SHIFT: u32 = 32;
const KIND_MASK: u64 = 0xF;
const STATE_SHIFT: u32 = 36;
const STATE_MASK: u64 = 0x3;
const COMMITTED_BIT: u64 = 1 << 38;
const UNLOADED_BIT: u64 = 1 << 39;

/// Snapshot of one blob's reader-visible metadata.
///
/// Constructed from a single atomic load, so all fields are mutually
/// consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlobRecord(pub u64);

impl BlobRecord {
    pub const EMPTY: BlobRecord = BlobRecord(0);

    pub fn new(kind: BlobKind, len_segments: u32) -> BlobRecord {
        BlobRecord(len_segments as u64 | (kind.code() << KIND_SHIFT))
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        (self.0 >> KIND_SHIFT) & KIND_MASK == 0
    }

    #[inline]
    pub fn len_segments(self) -> u32 {
        (self.0 & LEN_MASK) as u32
    }

    #[inline]
    pub fn kind(self) -> BlobKind {
        BlobKind::from_code((self.0 >> KIND_SHIFT) & KIND_MASK).expect("empty blob record")
    }

    #[inline]
    pub fn state(self) -> BlobState {
        BlobState::from_bits((self.0 >> STATE_SHIFT) & STATE_MASK)
    }

    #[inline]
    pub fn with_state(self, state: BlobState) -> BlobRecord {
        BlobRecord((self.0 & !(STATE_MASK << STATE_SHIFT)) | ((state as u64) << STATE_SHIFT))
    }

    #[inline]
    pub fn is_committed(self) -> bool {
        self.0 & COMMITTED_BIT != 0
    }

    #[inline]
    pub fn with_committed(self) -> BlobRecord {
        BlobRecord(self.0 | COMMITTED_BIT)
    }

    #[inline]
    pub fn is_unloaded(self) -> bool {
        self.0 & UNLOADED_BIT != 0
    }

    #[inline]
    pub fn with_unloaded(self) -> BlobRecord {
        BlobRecord(self.0 | UNLOADED_BIT)
    }
}

// =============================================================================
// Handles and references
// =============================================================================

/// Stable identity of a blob: owning heap plus start segment.
///
/// Links between blobs (the scavenge-root list) are stored as handles
/// rather than pointers, so a reclaimed blob can never leave a dangling
/// pointer behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobHandle {
    /// Index of the owning heap inside the cache.
    pub heap: u8,
    /// First segment of the blob inside that heap.
    pub start_segment: u32,
}

/// A non-owning view of a live blob, assembled from the lock-free index.
#[derive(Debug, Clone, Copy)]
pub struct BlobRef {
    /// Stable identity of the blob.
    pub handle: BlobHandle,
    /// Base address of the blob's code.
    pub base: usize,
    /// Size in bytes (whole segments).
    pub size: usize,
    /// Blob classification.
    pub kind: BlobKind,
    /// Liveness state at snapshot time.
    pub state: BlobState,
    /// Whether `commit` has run for this blob.
    pub committed: bool,
    /// Whether a GC unloading pass condemned this blob's roots.
    pub unloaded: bool,
}

impl BlobRef {
    /// Check if this blob's code range contains an address.
    #[inline]
    pub fn contains_address(&self, addr: usize) -> bool {
        addr >= self.base && addr < self.base + self.size
    }

    /// Whether the blob is in the zombie state.
    #[inline]
    pub fn is_zombie(&self) -> bool {
        self.state == BlobState::Zombie
    }

    /// Whether the blob may still be entered by new activations.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.state == BlobState::Alive
    }
}

// =============================================================================
// Method side data
// =============================================================================

/// Method-only bookkeeping kept under the allocation lock.
#[derive(Debug, Default)]
pub(crate) struct MethodData {
    /// Dependency keys this method was compiled against.
    pub dependencies: SmallVec<[u64; 4]>,
    /// Set by a deoptimization request; consumed by the bulk transitions.
    pub marked_for_deoptimization: bool,
    /// Next method on the scavenge-root list, if linked.
    pub scavenge_link: Option<BlobHandle>,
    /// Whether this method is currently on the scavenge-root list.
    pub on_scavenge_list: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [
            BlobKind::Stub,
            BlobKind::Adapter,
            BlobKind::DeoptHandler,
            BlobKind::Buffer,
            BlobKind::Method { profiled: true },
            BlobKind::Method { profiled: false },
        ] {
            assert_eq!(BlobKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(BlobKind::from_code(0), None);
    }

    #[test]
    fn test_record_packing() {
        let rec = BlobRecord::new(BlobKind::Method { profiled: false }, 17);
        assert!(!rec.is_empty());
        assert_eq!(rec.len_segments(), 17);
        assert_eq!(rec.kind(), BlobKind::Method { profiled: false });
        assert_eq!(rec.state(), BlobState::Alive);
        assert!(!rec.is_committed());
        assert!(!rec.is_unloaded());

        let rec = rec.with_committed().with_state(BlobState::NotEntrant);
        assert!(rec.is_committed());
        assert_eq!(rec.state(), BlobState::NotEntrant);
        assert_eq!(rec.len_segments(), 17);

        let rec = rec.with_state(BlobState::Zombie).with_unloaded();
        assert_eq!(rec.state(), BlobState::Zombie);
        assert!(rec.is_unloaded());
        assert_eq!(rec.kind(), BlobKind::Method { profiled: false });
    }

    #[test]
    fn test_empty_record() {
        assert!(BlobRecord::EMPTY.is_empty());
    }
}
