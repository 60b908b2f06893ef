//! Segmented code heaps.
//!
//! Each heap owns a contiguous sub-range of the cache's reservation,
//! subdivided into fixed-size segments. Two fixed-size side arrays are
//! sized for the full reservation at construction and never relocated:
//!
//! - the **segment map**: one byte per segment holding the distance back
//!   to the owning blob's start segment (`0xFF` = free), and
//! - the **record array**: one packed word per segment, non-empty only
//!   at blob start segments.
//!
//! Because neither array ever moves, walking them without a lock is
//! safe from any context, including signal handlers. All other heap
//! state (free list, commit watermark, method side data) is mutable
//! only under the cache-wide allocation lock and lives in [`HeapInner`].

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use crate::blob::{BlobHandle, BlobKind, BlobRecord, BlobRef, MethodData};
use crate::memory::VirtualSpace;

/// Segment-map marker for an unallocated segment.
const FREE_SENTINEL: u8 = 0xFF;
/// Largest back-distance stored in one segment-map byte; longer blobs
/// chain through multiple hops.
const MAX_HOP: u8 = 0xFE;

// =============================================================================
// Heap kind
// =============================================================================

/// Classification of a code heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapKind {
    /// Stubs, adapters, deoptimization handlers, buffers.
    NonMethod,
    /// Method code carrying profiling instrumentation.
    Profiled,
    /// Fully optimized method code.
    NonProfiled,
    /// Single-heap mode: accepts every blob kind.
    All,
}

impl HeapKind {
    /// Whether blobs of `kind` are routed to this heap.
    #[inline]
    pub fn accepts(self, kind: BlobKind) -> bool {
        match self {
            HeapKind::All => true,
            HeapKind::NonMethod => !kind.is_method(),
            HeapKind::Profiled => kind == BlobKind::Method { profiled: true },
            HeapKind::NonProfiled => kind == BlobKind::Method { profiled: false },
        }
    }

    /// Short display name used by summaries and fullness warnings.
    pub fn name(self) -> &'static str {
        match self {
            HeapKind::NonMethod => "non-method code heap",
            HeapKind::Profiled => "profiled method code heap",
            HeapKind::NonProfiled => "non-profiled method code heap",
            HeapKind::All => "code cache",
        }
    }
}

// =============================================================================
// Free list
// =============================================================================

/// A run of contiguous free segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SegRun {
    pub start: u32,
    pub len: u32,
}

// =============================================================================
// Heap state under the allocation lock
// =============================================================================

/// Mutable heap state; guarded by the cache-wide allocation lock.
pub(crate) struct HeapInner {
    /// Committed bytes from the heap base.
    pub committed_bytes: usize,
    /// First never-allocated segment below the commit watermark.
    pub frontier: u32,
    /// Reclaimed segment runs, sorted by start, coalesced.
    pub free_list: Vec<SegRun>,
    /// Total segments on the free list.
    pub free_segments: u32,
    /// Segments currently owned by live blobs.
    pub allocated_segments: u32,
    /// High-water mark of allocated bytes.
    pub max_allocated_bytes: usize,
    /// Method-only side data keyed by start segment.
    pub methods: FxHashMap<u32, MethodData>,
    /// Latch for the one-time fullness report.
    pub was_full: bool,
}

impl HeapInner {
    fn new() -> Self {
        Self {
            committed_bytes: 0,
            frontier: 0,
            free_list: Vec::new(),
            free_segments: 0,
            allocated_segments: 0,
            max_allocated_bytes: 0,
            methods: FxHashMap::default(),
            was_full: false,
        }
    }
}

// =============================================================================
// Code heap
// =============================================================================

/// The shared, lock-free-readable part of one code heap.
pub(crate) struct CodeHeap {
    /// Heap classification.
    pub kind: HeapKind,
    /// Base address of this heap's sub-range.
    low: usize,
    /// Byte offset of the sub-range inside the cache reservation.
    space_offset: usize,
    /// Reserved bytes for this heap.
    reserved_bytes: usize,
    /// log2 of the segment size.
    log2_segment: u32,
    /// Per-segment back-distance to the blob start; `0xFF` = free.
    segmap: Box<[AtomicU8]>,
    /// Per-segment packed blob records; non-empty at start segments only.
    records: Box<[AtomicU64]>,
}

impl CodeHeap {
    /// Create a heap over `[space_offset, space_offset + reserved_bytes)`
    /// of the reservation. Side arrays are sized for the full range.
    pub fn new(
        kind: HeapKind,
        space: &VirtualSpace,
        space_offset: usize,
        reserved_bytes: usize,
        segment_size: usize,
    ) -> (CodeHeap, HeapInner) {
        debug_assert!(segment_size.is_power_of_two());
        let reserved_segments = reserved_bytes / segment_size;
        let segmap = (0..reserved_segments)
            .map(|_| AtomicU8::new(FREE_SENTINEL))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let records = (0..reserved_segments)
            .map(|_| AtomicU64::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let heap = CodeHeap {
            kind,
            low: space.base() as usize + space_offset,
            space_offset,
            reserved_bytes,
            log2_segment: segment_size.trailing_zeros(),
            segmap,
            records,
        };
        (heap, HeapInner::new())
    }

    // =========================================================================
    // Geometry
    // =========================================================================

    /// Lowest address of the heap.
    #[inline]
    pub fn low(&self) -> usize {
        self.low
    }

    /// One past the highest reserved address.
    #[inline]
    pub fn high_boundary(&self) -> usize {
        self.low + self.reserved_bytes
    }

    /// Segment size in bytes.
    #[inline]
    pub fn segment_size(&self) -> usize {
        1 << self.log2_segment
    }

    /// Total reserved segments.
    #[inline]
    pub fn reserved_segments(&self) -> u32 {
        (self.reserved_bytes >> self.log2_segment) as u32
    }

    /// Reserved bytes.
    #[inline]
    pub fn max_capacity(&self) -> usize {
        self.reserved_bytes
    }

    /// Number of segments needed to hold `bytes`.
    #[inline]
    pub fn size_to_segments(&self, bytes: usize) -> u32 {
        (((bytes + self.segment_size() - 1) >> self.log2_segment) as u32).max(1)
    }

    /// Address of a segment.
    #[inline]
    pub fn segment_address(&self, segment: u32) -> usize {
        self.low + ((segment as usize) << self.log2_segment)
    }

    /// Check if an address is inside the heap's reserved range.
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.low && addr < self.high_boundary()
    }

    // =========================================================================
    // Lock-free index
    // =========================================================================

    /// Find the start segment of the blob covering `addr`, if any.
    ///
    /// Lock-free: the segment map is only appended to or reset to free
    /// under the allocation lock and never relocated, so a concurrent
    /// walk either lands on a fully published blob or reports a miss.
    pub fn find_start(&self, addr: usize) -> Option<u32> {
        if !self.contains(addr) {
            return None;
        }
        let mut seg = ((addr - self.low) >> self.log2_segment) as u32;
        loop {
            let hop = self.segmap[seg as usize].load(Ordering::Acquire);
            if hop == FREE_SENTINEL {
                return None;
            }
            if hop == 0 {
                return Some(seg);
            }
            seg -= hop as u32;
        }
    }

    /// Load the packed record at a start segment.
    #[inline]
    pub fn record_at(&self, segment: u32) -> BlobRecord {
        BlobRecord(self.records[segment as usize].load(Ordering::Acquire))
    }

    /// Store a record; callers hold the allocation lock or a safepoint.
    #[inline]
    pub fn store_record(&self, segment: u32, record: BlobRecord) {
        self.records[segment as usize].store(record.0, Ordering::Release);
    }

    /// Assemble a blob view from a non-empty record snapshot.
    pub fn blob_ref(&self, heap_index: u8, segment: u32, record: BlobRecord) -> BlobRef {
        debug_assert!(!record.is_empty());
        BlobRef {
            handle: BlobHandle {
                heap: heap_index,
                start_segment: segment,
            },
            base: self.segment_address(segment),
            size: (record.len_segments() as usize) << self.log2_segment,
            kind: record.kind(),
            state: record.state(),
            committed: record.is_committed(),
            unloaded: record.is_unloaded(),
        }
    }

    // =========================================================================
    // Allocation (lock held)
    // =========================================================================

    /// Allocate `nsegs` contiguous segments for a blob of `kind`.
    ///
    /// Free-list runs are preferred (first fit, splitting long runs);
    /// otherwise segments come from the committed frontier. Publishes
    /// the segment map before the record so lock-free readers never see
    /// a start without its metadata.
    pub fn allocate(&self, inner: &mut HeapInner, nsegs: u32, kind: BlobKind) -> Option<u32> {
        let start = self.take_segments(inner, nsegs)?;
        self.mark_segments(start, nsegs);
        self.store_record(start, BlobRecord::new(kind, nsegs));
        inner.allocated_segments += nsegs;
        let allocated = (inner.allocated_segments as usize) << self.log2_segment;
        inner.max_allocated_bytes = inner.max_allocated_bytes.max(allocated);
        Some(start)
    }

    fn take_segments(&self, inner: &mut HeapInner, nsegs: u32) -> Option<u32> {
        // First fit from the free list.
        if let Some(pos) = inner.free_list.iter().position(|run| run.len >= nsegs) {
            let run = &mut inner.free_list[pos];
            let start = run.start;
            run.start += nsegs;
            run.len -= nsegs;
            if run.len == 0 {
                inner.free_list.remove(pos);
            }
            inner.free_segments -= nsegs;
            return Some(start);
        }
        // Bump from the committed frontier.
        let committed_segments = (inner.committed_bytes >> self.log2_segment) as u32;
        if inner.frontier + nsegs <= committed_segments {
            let start = inner.frontier;
            inner.frontier += nsegs;
            return Some(start);
        }
        None
    }

    fn mark_segments(&self, start: u32, nsegs: u32) {
        debug_assert_eq!(
            self.segmap[start as usize].load(Ordering::Relaxed),
            FREE_SENTINEL,
            "allocating over a live segment"
        );
        // Interior entries first; the start byte is the publication point
        // for the segment-map walk.
        for offset in (1..nsegs).rev() {
            let hop = (offset.min(MAX_HOP as u32)) as u8;
            self.segmap[(start + offset) as usize].store(hop, Ordering::Relaxed);
        }
        self.segmap[start as usize].store(0, Ordering::Release);
    }

    /// Return a blob's segments to the free list.
    ///
    /// The record is cleared before the segment map so readers racing
    /// with the free observe a miss rather than stale metadata.
    pub fn deallocate(&self, inner: &mut HeapInner, start: u32) -> BlobRecord {
        let record = self.record_at(start);
        assert!(!record.is_empty(), "freeing an unallocated blob");
        debug_assert_eq!(
            self.segmap[start as usize].load(Ordering::Relaxed),
            0,
            "segment map corrupt at blob start"
        );
        let nsegs = record.len_segments();

        self.store_record(start, BlobRecord::EMPTY);
        for offset in 0..nsegs {
            self.segmap[(start + offset) as usize].store(FREE_SENTINEL, Ordering::Release);
        }

        inner.allocated_segments -= nsegs;
        inner.methods.remove(&start);
        self.release_run(inner, SegRun { start, len: nsegs });
        record
    }

    fn release_run(&self, inner: &mut HeapInner, run: SegRun) {
        inner.free_segments += run.len;
        let pos = inner
            .free_list
            .binary_search_by_key(&run.start, |r| r.start)
            .unwrap_err();
        inner.free_list.insert(pos, run);

        // Coalesce with the successor, then the predecessor.
        if pos + 1 < inner.free_list.len() {
            let next = inner.free_list[pos + 1];
            let cur = inner.free_list[pos];
            if cur.start + cur.len == next.start {
                inner.free_list[pos].len += next.len;
                inner.free_list.remove(pos + 1);
            }
        }
        if pos > 0 {
            let prev = inner.free_list[pos - 1];
            let cur = inner.free_list[pos];
            if prev.start + prev.len == cur.start {
                inner.free_list[pos - 1].len += cur.len;
                inner.free_list.remove(pos);
            }
        }
    }

    // =========================================================================
    // Growth and capacity (lock held)
    // =========================================================================

    /// Commit the initial working set.
    pub fn commit_initial(&self, inner: &mut HeapInner, space: &VirtualSpace, bytes: usize) -> bool {
        let bytes = crate::memory::align_up(bytes.min(self.reserved_bytes), self.segment_size());
        if bytes == 0 {
            return true;
        }
        if !space.commit(self.space_offset, bytes) {
            return false;
        }
        inner.committed_bytes = bytes;
        true
    }

    /// Grow the committed range by `step` bytes (clamped to the
    /// reservation). Returns `false` when the heap is already fully
    /// committed or the OS refuses backing store.
    pub fn expand_by(&self, inner: &mut HeapInner, space: &VirtualSpace, step: usize) -> bool {
        if inner.committed_bytes >= self.reserved_bytes {
            return false;
        }
        let step = crate::memory::align_up(step, crate::memory::PAGE_SIZE)
            .min(self.reserved_bytes - inner.committed_bytes);
        if !space.commit(self.space_offset + inner.committed_bytes, step) {
            return false;
        }
        inner.committed_bytes += step;
        true
    }

    /// Committed bytes.
    #[inline]
    pub fn capacity(&self, inner: &HeapInner) -> usize {
        inner.committed_bytes
    }

    /// Bytes owned by live blobs.
    #[inline]
    pub fn allocated_capacity(&self, inner: &HeapInner) -> usize {
        (inner.allocated_segments as usize) << self.log2_segment
    }

    /// Bytes still available against the full reservation.
    #[inline]
    pub fn unallocated_capacity(&self, inner: &HeapInner) -> usize {
        self.max_capacity() - self.allocated_capacity(inner)
    }

    /// Bytes sitting on the free list.
    #[inline]
    pub fn allocated_in_freelist(&self, inner: &HeapInner) -> usize {
        (inner.free_segments as usize) << self.log2_segment
    }

    /// Number of runs on the free list.
    #[inline]
    pub fn freelist_length(&self, inner: &HeapInner) -> usize {
        inner.free_list.len()
    }

    // =========================================================================
    // Verification (lock held)
    // =========================================================================

    /// Check segment-map / free-list / record consistency.
    ///
    /// Diagnostic; panics on corruption.
    pub fn verify(&self, inner: &HeapInner) {
        // Free-list runs must be sorted, disjoint, and marked free.
        let mut prev_end = 0u32;
        let mut listed = 0u32;
        for run in &inner.free_list {
            assert!(run.len > 0, "empty run on free list");
            assert!(run.start >= prev_end, "free list out of order or overlapping");
            for seg in run.start..run.start + run.len {
                assert_eq!(
                    self.segmap[seg as usize].load(Ordering::Relaxed),
                    FREE_SENTINEL,
                    "free-list segment not marked free"
                );
            }
            prev_end = run.start + run.len;
            listed += run.len;
        }
        assert_eq!(listed, inner.free_segments, "free segment count drift");

        // Every record's segment-map run must resolve back to it.
        let committed_segments = (inner.committed_bytes >> self.log2_segment) as u32;
        let mut live = 0u32;
        for seg in 0..committed_segments {
            let record = self.record_at(seg);
            if record.is_empty() {
                continue;
            }
            live += record.len_segments();
            for offset in 0..record.len_segments() {
                let addr = self.segment_address(seg + offset);
                assert_eq!(self.find_start(addr), Some(seg), "segment map walk broken");
            }
        }
        assert_eq!(live, inner.allocated_segments, "allocated segment count drift");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::VirtualSpace;

    fn heap_with(segments: u32) -> (VirtualSpace, CodeHeap, HeapInner) {
        let seg_size = 64usize;
        let bytes = segments as usize * seg_size;
        let reserve_bytes = crate::memory::align_up(bytes, 4096);
        let space = VirtualSpace::reserve(reserve_bytes).expect("reservation failed");
        let (heap, mut inner) = CodeHeap::new(HeapKind::All, &space, 0, bytes, seg_size);
        assert!(heap.commit_initial(&mut inner, &space, bytes));
        (space, heap, inner)
    }

    #[test]
    fn test_allocate_and_find_start() {
        let (_space, heap, mut inner) = heap_with(64);

        let start = heap.allocate(&mut inner, 3, BlobKind::Stub).expect("alloc");
        assert_eq!(start, 0);

        let base = heap.segment_address(start);
        assert_eq!(heap.find_start(base), Some(start));
        assert_eq!(heap.find_start(base + 100), Some(start));
        assert_eq!(heap.find_start(base + 3 * 64 - 1), Some(start));
        assert_eq!(heap.find_start(base + 3 * 64), None);
    }

    #[test]
    fn test_allocations_are_disjoint() {
        let (_space, heap, mut inner) = heap_with(64);

        let a = heap.allocate(&mut inner, 4, BlobKind::Stub).unwrap();
        let b = heap.allocate(&mut inner, 4, BlobKind::Buffer).unwrap();
        assert_ne!(a, b);
        assert!(b >= a + 4 || a >= b + 4);
        heap.verify(&inner);
    }

    #[test]
    fn test_free_list_reuse_at_same_base() {
        let (_space, heap, mut inner) = heap_with(8);

        let a = heap.allocate(&mut inner, 4, BlobKind::Stub).unwrap();
        let _b = heap.allocate(&mut inner, 4, BlobKind::Stub).unwrap();
        assert!(heap.allocate(&mut inner, 1, BlobKind::Stub).is_none());

        heap.deallocate(&mut inner, a);
        let again = heap.allocate(&mut inner, 4, BlobKind::Stub).unwrap();
        assert_eq!(again, a, "free-list run should be reused at the same base");
        heap.verify(&inner);
    }

    #[test]
    fn test_free_list_coalescing() {
        let (_space, heap, mut inner) = heap_with(16);

        let a = heap.allocate(&mut inner, 2, BlobKind::Stub).unwrap();
        let b = heap.allocate(&mut inner, 2, BlobKind::Stub).unwrap();
        let c = heap.allocate(&mut inner, 2, BlobKind::Stub).unwrap();

        heap.deallocate(&mut inner, a);
        heap.deallocate(&mut inner, c);
        assert_eq!(heap.freelist_length(&inner), 2);

        // Freeing the middle run joins all three.
        heap.deallocate(&mut inner, b);
        assert_eq!(heap.freelist_length(&inner), 1);
        assert_eq!(inner.free_segments, 6);
        heap.verify(&inner);
    }

    #[test]
    fn test_expand_by_grows_commit() {
        let seg_size = 64usize;
        let space = VirtualSpace::reserve(64 * 1024).expect("reservation failed");
        let (heap, mut inner) = CodeHeap::new(HeapKind::All, &space, 0, 64 * 1024, seg_size);
        assert!(heap.commit_initial(&mut inner, &space, 4096));

        // 64 segments committed; a 65th fails until we expand.
        assert!(heap.allocate(&mut inner, 64, BlobKind::Stub).is_some());
        assert!(heap.allocate(&mut inner, 1, BlobKind::Stub).is_none());
        assert!(heap.expand_by(&mut inner, &space, 4096));
        assert!(heap.allocate(&mut inner, 1, BlobKind::Stub).is_some());
    }

    #[test]
    fn test_long_blob_segment_walk() {
        let (_space, heap, mut inner) = heap_with(600);

        // Longer than one segment-map hop (254).
        let start = heap.allocate(&mut inner, 520, BlobKind::Buffer).unwrap();
        let last = heap.segment_address(start + 519);
        assert_eq!(heap.find_start(last), Some(start));
    }

    #[test]
    #[should_panic(expected = "freeing an unallocated blob")]
    fn test_double_free_is_caught() {
        let (_space, heap, mut inner) = heap_with(8);
        let a = heap.allocate(&mut inner, 2, BlobKind::Stub).unwrap();
        heap.deallocate(&mut inner, a);
        heap.deallocate(&mut inner, a);
    }

    #[test]
    fn test_heap_kind_routing() {
        assert!(HeapKind::All.accepts(BlobKind::Method { profiled: true }));
        assert!(HeapKind::NonMethod.accepts(BlobKind::Adapter));
        assert!(!HeapKind::NonMethod.accepts(BlobKind::Method { profiled: false }));
        assert!(HeapKind::Profiled.accepts(BlobKind::Method { profiled: true }));
        assert!(!HeapKind::Profiled.accepts(BlobKind::Method { profiled: false }));
        assert!(HeapKind::NonProfiled.accepts(BlobKind::Method { profiled: false }));
    }
}
