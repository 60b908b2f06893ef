//! The executable-memory cache.
//!
//! One `CodeCache` owns the whole reservation and every heap carved from
//! it. Mutating operations funnel through a single allocation lock;
//! stop-the-world operations additionally demand a [`Safepoint`] token.
//! Address lookup (`find_blob`) is lock-free and safe to call from a
//! signal handler.

use parking_lot::Mutex;

use crate::blob::{BlobHandle, BlobKind, BlobRef, BlobState, MethodData};
use crate::config::{CodeCacheConfig, ConfigError};
use crate::heap::{CodeHeap, HeapInner, HeapKind};
use crate::memory::{icache, VirtualSpace};
use crate::safepoint::Safepoint;
use crate::stats::{CodeCacheFullEvent, CodeCacheStats};

// =============================================================================
// Errors
// =============================================================================

/// Errors surfaced by cache operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCacheError {
    /// Configuration rejected by validation.
    Config(ConfigError),
    /// The OS refused the initial address-space reservation.
    ReservationFailed,
    /// The OS refused to commit backing pages for the working set.
    CommitFailed,
    /// No heap can hold a blob of this kind; expansion and overflow
    /// routing were both exhausted.
    CacheFull(BlobKind),
    /// The handle does not name a live blob.
    InvalidHandle,
    /// Code contents are larger than the blob's allocation.
    CodeTooLarge,
    /// The blob's contents were already committed.
    AlreadyCommitted,
}

impl std::fmt::Display for CodeCacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodeCacheError::Config(e) => write!(f, "invalid configuration: {e}"),
            CodeCacheError::ReservationFailed => {
                write!(f, "could not reserve code cache address space")
            }
            CodeCacheError::CommitFailed => {
                write!(f, "could not commit code cache working set")
            }
            CodeCacheError::CacheFull(kind) => {
                write!(f, "code cache is full for {kind:?} blobs")
            }
            CodeCacheError::InvalidHandle => write!(f, "stale or invalid blob handle"),
            CodeCacheError::CodeTooLarge => {
                write!(f, "code contents exceed the blob allocation")
            }
            CodeCacheError::AlreadyCommitted => write!(f, "blob contents already committed"),
        }
    }
}

impl std::error::Error for CodeCacheError {}

// =============================================================================
// Cache state under the allocation lock
// =============================================================================

struct CacheInner {
    /// Per-heap mutable state, parallel to `CodeCache::heaps`.
    heaps: Vec<HeapInner>,
    /// Head of the scavenge-root method list.
    scavenge_head: Option<BlobHandle>,
    /// Allocated blobs, maintained at allocate/free time.
    blob_count: usize,
    /// Committed blobs by class, maintained at commit/free time.
    method_count: usize,
    adapter_count: usize,
}

// =============================================================================
// Code cache
// =============================================================================

/// The executable-memory cache.
pub struct CodeCache {
    space: VirtualSpace,
    heaps: Vec<CodeHeap>,
    inner: Mutex<CacheInner>,
    config: CodeCacheConfig,
    stats: CodeCacheStats,
}

impl CodeCache {
    /// Reserve the configured budget and commit the initial working set.
    pub fn new(config: CodeCacheConfig) -> Result<CodeCache, CodeCacheError> {
        config.validate().map_err(CodeCacheError::Config)?;
        let space =
            VirtualSpace::reserve(config.reserved_size).ok_or(CodeCacheError::ReservationFailed)?;

        let mut heaps = Vec::new();
        let mut inners = Vec::new();
        let mut offset = 0usize;
        for (kind, bytes) in config.heap_sizes() {
            let bytes = bytes & !(config.segment_size - 1);
            let (heap, mut inner) = CodeHeap::new(kind, &space, offset, bytes, config.segment_size);
            if !heap.commit_initial(&mut inner, &space, config.initial_size) {
                return Err(CodeCacheError::CommitFailed);
            }
            offset += bytes;
            heaps.push(heap);
            inners.push(inner);
        }

        Ok(CodeCache {
            space,
            heaps,
            inner: Mutex::new(CacheInner {
                heaps: inners,
                scavenge_head: None,
                blob_count: 0,
                method_count: 0,
                adapter_count: 0,
            }),
            config,
            stats: CodeCacheStats::default(),
        })
    }

    /// Activity counters.
    #[inline]
    pub fn stats(&self) -> &CodeCacheStats {
        &self.stats
    }

    fn heap_index_for(&self, kind: BlobKind) -> usize {
        if self.heaps.len() == 1 {
            return 0;
        }
        let wanted = match kind {
            BlobKind::Method { profiled: true } => HeapKind::Profiled,
            BlobKind::Method { profiled: false } => HeapKind::NonProfiled,
            _ => HeapKind::NonMethod,
        };
        self.heaps
            .iter()
            .position(|h| h.kind == wanted)
            .unwrap_or(0)
    }

    fn heap_of(&self, handle: BlobHandle) -> &CodeHeap {
        &self.heaps[handle.heap as usize]
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Allocate segments for a blob of `kind` holding `size` bytes.
    ///
    /// On a full heap the cache first grows the committed range in
    /// configured steps; when the non-method heap's reservation is
    /// exhausted, allocation overflows into the non-profiled method
    /// heap. Failure fires the one-time fullness report for the heap.
    pub fn allocate(&self, size: usize, kind: BlobKind) -> Result<BlobHandle, CodeCacheError> {
        assert!(size > 0, "allocating an empty blob");
        let mut inner = self.inner.lock();
        let mut heap_idx = self.heap_index_for(kind);
        let mut overflowed = false;
        loop {
            let heap = &self.heaps[heap_idx];
            let nsegs = heap.size_to_segments(size);
            if let Some(start) = heap.allocate(&mut inner.heaps[heap_idx], nsegs, kind) {
                if kind.is_method() {
                    inner.heaps[heap_idx]
                        .methods
                        .insert(start, MethodData::default());
                }
                inner.blob_count += 1;
                self.stats
                    .record_allocation((nsegs as usize) * heap.segment_size());
                return Ok(BlobHandle {
                    heap: heap_idx as u8,
                    start_segment: start,
                });
            }
            if heap.expand_by(&mut inner.heaps[heap_idx], &self.space, self.config.expansion_size)
            {
                self.stats.record_expansion();
                continue;
            }
            // Non-method code may spill into the non-profiled method heap
            // once its own reservation is exhausted.
            if !overflowed && heap.kind == HeapKind::NonMethod {
                if let Some(idx) = self.heaps.iter().position(|h| h.kind == HeapKind::NonProfiled)
                {
                    overflowed = true;
                    heap_idx = idx;
                    continue;
                }
            }
            self.report_full(heap_idx, &mut inner);
            return Err(CodeCacheError::CacheFull(kind));
        }
    }

    /// Copy compiled code into a freshly allocated blob and make it
    /// visible to instruction fetch.
    ///
    /// A blob may be committed exactly once; until then it is excluded
    /// from the kind-specific counts (it already counts as a blob).
    pub fn commit(&self, handle: BlobHandle, code: &[u8]) -> Result<(), CodeCacheError> {
        let mut inner = self.inner.lock();
        let heap = self.heap_of(handle);
        let record = heap.record_at(handle.start_segment);
        if record.is_empty() {
            return Err(CodeCacheError::InvalidHandle);
        }
        if record.is_committed() {
            return Err(CodeCacheError::AlreadyCommitted);
        }
        let size = (record.len_segments() as usize) * heap.segment_size();
        if code.len() > size {
            return Err(CodeCacheError::CodeTooLarge);
        }

        let base = heap.segment_address(handle.start_segment) as *mut u8;
        // SAFETY: the blob's segments are committed read-write-execute
        // and exclusively owned by the caller until the committed bit is
        // published below.
        unsafe {
            std::ptr::copy_nonoverlapping(code.as_ptr(), base, code.len());
        }
        icache::invalidate_range(base, code.len());
        heap.store_record(handle.start_segment, record.with_committed());

        match record.kind() {
            BlobKind::Method { .. } => inner.method_count += 1,
            BlobKind::Adapter => inner.adapter_count += 1,
            _ => {}
        }
        self.stats.record_commit();
        Ok(())
    }

    /// Return a blob's segments to its heap.
    pub fn free(&self, handle: BlobHandle) -> Result<(), CodeCacheError> {
        let mut inner = self.inner.lock();
        let heap = self.heap_of(handle);
        if heap.record_at(handle.start_segment).is_empty() {
            return Err(CodeCacheError::InvalidHandle);
        }
        self.free_locked(&mut inner, handle);
        Ok(())
    }

    /// Free with the lock held. The handle must be live.
    fn free_locked(&self, inner: &mut CacheInner, handle: BlobHandle) {
        self.unlink_scavenge_root(inner, handle);
        let heap = self.heap_of(handle);
        let record = heap.deallocate(&mut inner.heaps[handle.heap as usize], handle.start_segment);
        // Kind counters move at commit, so blobs that never reached it
        // only come off the global count.
        if record.is_committed() {
            match record.kind() {
                BlobKind::Method { .. } => inner.method_count -= 1,
                BlobKind::Adapter => inner.adapter_count -= 1,
                _ => {}
            }
        }
        inner.blob_count -= 1;
        self.stats
            .record_free((record.len_segments() as usize) * heap.segment_size());
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Find the blob covering `addr`, hiding zombies.
    ///
    /// Lock-free and async-signal-safe. Callers in executing contexts
    /// must never reach zombie code; a zombie hit reports a miss.
    pub fn find_blob(&self, addr: usize) -> Option<BlobRef> {
        let blob = self.find_blob_unsafe(addr)?;
        if blob.is_zombie() {
            return None;
        }
        Some(blob)
    }

    /// Find the blob covering `addr`, including zombies.
    ///
    /// For privileged callers (sweeper, debugger) that must see blobs in
    /// every state.
    pub fn find_blob_unsafe(&self, addr: usize) -> Option<BlobRef> {
        let (idx, heap) = self
            .heaps
            .iter()
            .enumerate()
            .find(|(_, h)| h.contains(addr))?;
        let start = heap.find_start(addr)?;
        let record = heap.record_at(start);
        if record.is_empty() {
            return None;
        }
        let blob = heap.blob_ref(idx as u8, start, record);
        // A racing free/realloc can shrink the blob between the segment
        // walk and the record load; a snapshot that no longer covers the
        // queried address is a miss.
        if !blob.contains_address(addr) {
            return None;
        }
        Some(blob)
    }

    /// Whether `addr` falls inside the cache reservation.
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        self.space.contains(addr)
    }

    /// Resolve a handle to a current snapshot of the blob.
    pub fn blob_at(&self, handle: BlobHandle) -> Option<BlobRef> {
        let heap = self.heaps.get(handle.heap as usize)?;
        let record = heap.record_at(handle.start_segment);
        if record.is_empty() {
            return None;
        }
        Some(heap.blob_ref(handle.heap, handle.start_segment, record))
    }

    // =========================================================================
    // Dependencies and deoptimization
    // =========================================================================

    /// Record a dependency key on a method blob.
    pub fn add_dependency(&self, handle: BlobHandle, key: u64) -> Result<(), CodeCacheError> {
        let mut inner = self.inner.lock();
        let data = inner.heaps[handle.heap as usize]
            .methods
            .get_mut(&handle.start_segment)
            .ok_or(CodeCacheError::InvalidHandle)?;
        if !data.dependencies.contains(&key) {
            data.dependencies.push(key);
        }
        Ok(())
    }

    /// Mark every method depending on `key` for deoptimization.
    ///
    /// Idempotent: methods already marked are not counted again. Returns
    /// the number of newly marked methods.
    pub fn mark_for_deoptimization(&self, key: u64) -> usize {
        let mut inner = self.inner.lock();
        let mut marked = 0;
        for heap_inner in &mut inner.heaps {
            for data in heap_inner.methods.values_mut() {
                if data.dependencies.contains(&key) && !data.marked_for_deoptimization {
                    data.marked_for_deoptimization = true;
                    marked += 1;
                }
            }
        }
        marked
    }

    /// Mark every method in the cache for deoptimization.
    ///
    /// Returns the number of newly marked methods.
    pub fn mark_all_methods_for_deoptimization(&self) -> usize {
        let mut inner = self.inner.lock();
        let mut marked = 0;
        for heap_inner in &mut inner.heaps {
            for data in heap_inner.methods.values_mut() {
                if !data.marked_for_deoptimization {
                    data.marked_for_deoptimization = true;
                    marked += 1;
                }
            }
        }
        marked
    }

    /// Mark one method for deoptimization directly.
    pub fn mark_blob_for_deoptimization(&self, handle: BlobHandle) -> Result<bool, CodeCacheError> {
        let mut inner = self.inner.lock();
        let data = inner.heaps[handle.heap as usize]
            .methods
            .get_mut(&handle.start_segment)
            .ok_or(CodeCacheError::InvalidHandle)?;
        let newly = !data.marked_for_deoptimization;
        data.marked_for_deoptimization = true;
        Ok(newly)
    }

    /// Transition every marked, still-alive method to not-entrant.
    pub fn make_marked_not_entrant(&self, _sp: &Safepoint) -> usize {
        let mut inner = self.inner.lock();
        let mut transitioned = 0;
        for (idx, heap) in self.heaps.iter().enumerate() {
            let heap_inner = &mut inner.heaps[idx];
            for (&start, data) in &heap_inner.methods {
                if !data.marked_for_deoptimization {
                    continue;
                }
                let record = heap.record_at(start);
                if record.state() == BlobState::Alive {
                    heap.store_record(start, record.with_state(BlobState::NotEntrant));
                    transitioned += 1;
                }
            }
        }
        self.stats.record_not_entrant(transitioned as u64);
        transitioned
    }

    /// Transition marked not-entrant methods to zombie when `can_convert`
    /// confirms no activation still references them.
    pub fn make_marked_zombies(
        &self,
        _sp: &Safepoint,
        can_convert: impl Fn(&BlobRef) -> bool,
    ) -> usize {
        let mut inner = self.inner.lock();
        let mut transitioned = 0;
        for (idx, heap) in self.heaps.iter().enumerate() {
            let heap_inner = &mut inner.heaps[idx];
            let mut converted = Vec::new();
            for (&start, data) in &heap_inner.methods {
                if !data.marked_for_deoptimization {
                    continue;
                }
                let record = heap.record_at(start);
                if record.state() != BlobState::NotEntrant {
                    continue;
                }
                let blob = heap.blob_ref(idx as u8, start, record);
                if can_convert(&blob) {
                    heap.store_record(start, record.with_state(BlobState::Zombie));
                    converted.push(start);
                    transitioned += 1;
                }
            }
            for start in converted {
                if let Some(data) = heap_inner.methods.get_mut(&start) {
                    data.marked_for_deoptimization = false;
                }
            }
        }
        self.stats.record_zombies(transitioned as u64);
        transitioned
    }

    // =========================================================================
    // Unloading and sweeping
    // =========================================================================

    /// Condemn methods whose roots a GC cycle proved dead.
    ///
    /// Dead methods are flagged unloaded and transitioned straight to
    /// zombie; the sweeper reclaims them on its next pass.
    pub fn do_unloading(&self, _sp: &Safepoint, is_alive: impl Fn(&BlobRef) -> bool) -> usize {
        let mut inner = self.inner.lock();
        let mut unloaded = 0;
        for (idx, heap) in self.heaps.iter().enumerate() {
            let starts: Vec<u32> = inner.heaps[idx].methods.keys().copied().collect();
            for start in starts {
                let record = heap.record_at(start);
                if record.state() == BlobState::Zombie {
                    continue;
                }
                let blob = heap.blob_ref(idx as u8, start, record);
                if !is_alive(&blob) {
                    heap.store_record(
                        start,
                        record.with_unloaded().with_state(BlobState::Zombie),
                    );
                    self.unlink_scavenge_root(
                        &mut inner,
                        BlobHandle {
                            heap: idx as u8,
                            start_segment: start,
                        },
                    );
                    unloaded += 1;
                }
            }
        }
        self.stats.record_zombies(unloaded as u64);
        unloaded
    }

    /// Reclaim every zombie blob. Returns (blobs, bytes) swept.
    pub fn sweep_zombies(&self, _sp: &Safepoint) -> (usize, usize) {
        let mut inner = self.inner.lock();
        let mut swept = 0;
        let mut bytes = 0;
        for (idx, heap) in self.heaps.iter().enumerate() {
            let zombies: Vec<u32> = inner.heaps[idx]
                .methods
                .keys()
                .copied()
                .filter(|&s| heap.record_at(s).state() == BlobState::Zombie)
                .collect();
            for start in zombies {
                let record = heap.record_at(start);
                bytes += (record.len_segments() as usize) * heap.segment_size();
                self.free_locked(
                    &mut inner,
                    BlobHandle {
                        heap: idx as u8,
                        start_segment: start,
                    },
                );
                swept += 1;
            }
        }
        self.stats.record_swept(swept as u64);
        (swept, bytes)
    }

    // =========================================================================
    // Scavenge roots
    // =========================================================================

    /// Link a method onto the scavenge-root list. Idempotent.
    pub fn add_scavenge_root(&self, handle: BlobHandle) -> Result<(), CodeCacheError> {
        let mut inner = self.inner.lock();
        let head = inner.scavenge_head;
        let data = inner.heaps[handle.heap as usize]
            .methods
            .get_mut(&handle.start_segment)
            .ok_or(CodeCacheError::InvalidHandle)?;
        if data.on_scavenge_list {
            return Ok(());
        }
        data.scavenge_link = head;
        data.on_scavenge_list = true;
        inner.scavenge_head = Some(handle);
        Ok(())
    }

    /// Unlink a method from the scavenge-root list. Idempotent.
    pub fn drop_scavenge_root(&self, handle: BlobHandle) {
        let mut inner = self.inner.lock();
        self.unlink_scavenge_root(&mut inner, handle);
    }

    fn unlink_scavenge_root(&self, inner: &mut CacheInner, handle: BlobHandle) {
        let on_list = inner.heaps[handle.heap as usize]
            .methods
            .get(&handle.start_segment)
            .map(|d| d.on_scavenge_list)
            .unwrap_or(false);
        if !on_list {
            return;
        }
        let next = inner.heaps[handle.heap as usize]
            .methods
            .get(&handle.start_segment)
            .and_then(|d| d.scavenge_link);

        if inner.scavenge_head == Some(handle) {
            inner.scavenge_head = next;
        } else {
            // Walk to the predecessor and splice around the victim.
            let mut cursor = inner.scavenge_head;
            while let Some(cur) = cursor {
                let link = inner.heaps[cur.heap as usize]
                    .methods
                    .get(&cur.start_segment)
                    .and_then(|d| d.scavenge_link);
                if link == Some(handle) {
                    if let Some(data) = inner.heaps[cur.heap as usize]
                        .methods
                        .get_mut(&cur.start_segment)
                    {
                        data.scavenge_link = next;
                    }
                    break;
                }
                cursor = link;
            }
        }

        if let Some(data) = inner.heaps[handle.heap as usize]
            .methods
            .get_mut(&handle.start_segment)
        {
            data.on_scavenge_list = false;
            data.scavenge_link = None;
        }
    }

    /// Visit every method on the scavenge-root list.
    pub fn scavenge_roots_do(&self, mut visit: impl FnMut(&BlobRef)) {
        let inner = self.inner.lock();
        let mut cursor = inner.scavenge_head;
        while let Some(handle) = cursor {
            let heap = self.heap_of(handle);
            let record = heap.record_at(handle.start_segment);
            if !record.is_empty() {
                visit(&heap.blob_ref(handle.heap, handle.start_segment, record));
            }
            cursor = inner.heaps[handle.heap as usize]
                .methods
                .get(&handle.start_segment)
                .and_then(|d| d.scavenge_link);
        }
    }

    /// Drop scavenge-root entries whose method is no longer alive.
    pub fn prune_scavenge_roots(&self, _sp: &Safepoint) -> usize {
        let mut inner = self.inner.lock();
        let mut stale = Vec::new();
        let mut cursor = inner.scavenge_head;
        while let Some(handle) = cursor {
            let heap = self.heap_of(handle);
            let record = heap.record_at(handle.start_segment);
            if record.is_empty() || record.state() != BlobState::Alive {
                stale.push(handle);
            }
            cursor = inner.heaps[handle.heap as usize]
                .methods
                .get(&handle.start_segment)
                .and_then(|d| d.scavenge_link);
        }
        for handle in &stale {
            self.unlink_scavenge_root(&mut inner, *handle);
        }
        stale.len()
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Visit every live blob, lowest address first, under the lock.
    pub fn blobs_do(&self, mut visit: impl FnMut(&BlobRef)) {
        let inner = self.inner.lock();
        for (idx, heap) in self.heaps.iter().enumerate() {
            let committed_segments =
                (inner.heaps[idx].committed_bytes / heap.segment_size()) as u32;
            for start in 0..committed_segments {
                let record = heap.record_at(start);
                if !record.is_empty() {
                    visit(&heap.blob_ref(idx as u8, start, record));
                }
            }
        }
    }

    /// Visit every method blob under the lock.
    pub fn methods_do(&self, mut visit: impl FnMut(&BlobRef)) {
        let inner = self.inner.lock();
        for (idx, heap) in self.heaps.iter().enumerate() {
            for &start in inner.heaps[idx].methods.keys() {
                let record = heap.record_at(start);
                if !record.is_empty() {
                    visit(&heap.blob_ref(idx as u8, start, record));
                }
            }
        }
    }

    /// Snapshot every live blob for iteration.
    ///
    /// Pair with [`crate::ParallelClaimer`] to divide the snapshot among
    /// worker threads at a safepoint.
    pub fn snapshot_blobs(&self) -> Vec<BlobRef> {
        let inner = self.inner.lock();
        let mut blobs = Vec::new();
        for (idx, heap) in self.heaps.iter().enumerate() {
            let committed_segments =
                (inner.heaps[idx].committed_bytes / heap.segment_size()) as u32;
            for start in 0..committed_segments {
                let record = heap.record_at(start);
                if !record.is_empty() {
                    blobs.push(heap.blob_ref(idx as u8, start, record));
                }
            }
        }
        blobs
    }

    // =========================================================================
    // Capacity
    // =========================================================================

    /// Committed bytes across all heaps.
    pub fn capacity(&self) -> usize {
        let inner = self.inner.lock();
        self.heaps
            .iter()
            .zip(&inner.heaps)
            .map(|(h, i)| h.capacity(i))
            .sum()
    }

    /// Reserved bytes across all heaps.
    pub fn max_capacity(&self) -> usize {
        self.heaps.iter().map(|h| h.max_capacity()).sum()
    }

    /// Bytes still available for allocation against the reservation.
    pub fn unallocated_capacity(&self) -> usize {
        let inner = self.inner.lock();
        self.heaps
            .iter()
            .zip(&inner.heaps)
            .map(|(h, i)| h.unallocated_capacity(i))
            .sum()
    }

    /// Ratio of reserved space to free space for the heap serving `kind`.
    ///
    /// Grows as the heap fills; compilation policy uses it to throttle
    /// inlining before the cache runs out.
    pub fn reverse_free_ratio(&self, kind: BlobKind) -> f64 {
        let inner = self.inner.lock();
        let idx = self.heap_index_for(kind);
        let heap = &self.heaps[idx];
        let unallocated = heap.unallocated_capacity(&inner.heaps[idx]).max(1);
        heap.max_capacity() as f64 / unallocated as f64
    }

    /// Whether any heap has crossed the configured free-space floor.
    pub fn is_full(&self) -> bool {
        let inner = self.inner.lock();
        self.heaps
            .iter()
            .zip(&inner.heaps)
            .any(|(h, i)| h.unallocated_capacity(i) < self.config.min_free_space)
    }

    /// Allocated blobs, including those not yet committed.
    pub fn blob_count(&self) -> usize {
        self.inner.lock().blob_count
    }

    /// Committed method blobs.
    pub fn method_count(&self) -> usize {
        self.inner.lock().method_count
    }

    /// Committed adapter blobs.
    pub fn adapter_count(&self) -> usize {
        self.inner.lock().adapter_count
    }

    /// Methods carrying at least one dependency key.
    pub fn methods_with_dependencies(&self) -> usize {
        let inner = self.inner.lock();
        inner
            .heaps
            .iter()
            .flat_map(|h| h.methods.values())
            .filter(|d| !d.dependencies.is_empty())
            .count()
    }

    fn report_full(&self, heap_idx: usize, inner: &mut CacheInner) {
        let heap = &self.heaps[heap_idx];
        if inner.heaps[heap_idx].was_full {
            return;
        }
        inner.heaps[heap_idx].was_full = true;
        let unallocated = heap.unallocated_capacity(&inner.heaps[heap_idx]);
        eprintln!(
            "warning: {} is full; compilation into it has been curtailed \
             ({} bytes unallocated of {} reserved)",
            heap.kind.name(),
            unallocated,
            heap.max_capacity()
        );
        self.stats.record_full(CodeCacheFullEvent {
            heap: heap.kind.name(),
            unallocated,
            at: std::time::Instant::now(),
        });
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// One-line usage summary per heap.
    pub fn summary_string(&self) -> String {
        use std::fmt::Write;
        let inner = self.inner.lock();
        let mut out = String::new();
        for (heap, heap_inner) in self.heaps.iter().zip(&inner.heaps) {
            let _ = writeln!(
                out,
                "{}: size={}Kb used={}Kb max_used={}Kb free={}Kb freelist={} runs ({}Kb)",
                heap.kind.name(),
                heap.max_capacity() / 1024,
                heap.allocated_capacity(heap_inner) / 1024,
                heap_inner.max_allocated_bytes / 1024,
                heap.unallocated_capacity(heap_inner) / 1024,
                heap.freelist_length(heap_inner),
                heap.allocated_in_freelist(heap_inner) / 1024
            );
        }
        let _ = writeln!(
            out,
            "total: committed={}Kb reserved={}Kb blobs={} methods={} adapters={}",
            self.heaps
                .iter()
                .zip(&inner.heaps)
                .map(|(h, i)| h.capacity(i))
                .sum::<usize>()
                / 1024,
            self.heaps.iter().map(|h| h.max_capacity()).sum::<usize>() / 1024,
            inner.blob_count,
            inner.method_count,
            inner.adapter_count
        );
        out
    }

    /// Print the usage summary to stderr.
    pub fn log_state(&self) {
        eprint!("{}", self.summary_string());
    }

    /// Check heap and list consistency. Diagnostic; panics on corruption.
    pub fn verify(&self) {
        let inner = self.inner.lock();
        for (heap, heap_inner) in self.heaps.iter().zip(&inner.heaps) {
            heap.verify(heap_inner);
        }
        // Every scavenge-list entry must claim membership and be a method.
        let mut cursor = inner.scavenge_head;
        while let Some(handle) = cursor {
            let data = inner.heaps[handle.heap as usize]
                .methods
                .get(&handle.start_segment)
                .expect("scavenge list references a freed method");
            assert!(data.on_scavenge_list, "scavenge list membership drift");
            cursor = data.scavenge_link;
        }
    }
}
