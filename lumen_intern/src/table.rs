//! The interned-string table.
//!
//! A fixed bucket array of lock-free chains. Lookups never lock:
//! entries are published by a release store at the chain head and are
//! only ever unlinked at a safepoint, so a concurrent walk sees a
//! well-formed chain. Inserting a new string takes the single insert
//! lock and probes again under it before linking, which keeps the
//! same-contents-same-reference guarantee under racing interns.
//!
//! The bucket array itself is only replaced by [`StringTable::rehash`],
//! which runs at a safepoint; between safepoints the core pointer is
//! stable.

use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::claim::BucketClaimer;
use crate::config::{StringTableConfig, TableConfigError};
use crate::hashing::TableHasher;
use crate::safepoint::Safepoint;
use crate::string::{InternedStr, StrRef};

// =============================================================================
// Chain entries and the table core
// =============================================================================

struct Entry {
    /// Hash of `literal` under the owning generation's hasher.
    hash: u32,
    literal: StrRef,
    next: AtomicPtr<Entry>,
}

/// One generation of the table: a bucket array plus the hash function
/// its entries were distributed by.
struct TableCore {
    buckets: Box<[AtomicPtr<Entry>]>,
    hasher: TableHasher,
}

impl TableCore {
    fn new(bucket_count: usize, hasher: TableHasher) -> TableCore {
        let buckets = (0..bucket_count)
            .map(|_| AtomicPtr::new(ptr::null_mut()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        TableCore { buckets, hasher }
    }

    #[inline]
    fn bucket_index(&self, hash: u32) -> usize {
        hash as usize % self.buckets.len()
    }

    /// Walk one chain. Returns the match, if any, and the chain length
    /// inspected.
    fn lookup(&self, hash: u32, s: &str) -> (Option<StrRef>, usize) {
        let mut chain = 0;
        let mut cur = self.buckets[self.bucket_index(hash)].load(Ordering::Acquire);
        while !cur.is_null() {
            // SAFETY: non-null chain pointers always reference a live
            // entry; entries are only freed at safepoints, when no
            // concurrent walk exists.
            let entry = unsafe { &*cur };
            chain += 1;
            if entry.hash == hash && entry.literal.as_str() == s {
                return (Some(entry.literal.clone()), chain);
            }
            cur = entry.next.load(Ordering::Acquire);
        }
        (None, chain)
    }

    /// Link a new entry at its chain head. Requires the insert lock or
    /// exclusive access.
    fn insert(&self, hash: u32, literal: StrRef) {
        let bucket = &self.buckets[self.bucket_index(hash)];
        let entry = Box::into_raw(Box::new(Entry {
            hash,
            literal,
            next: AtomicPtr::new(bucket.load(Ordering::Relaxed)),
        }));
        bucket.store(entry, Ordering::Release);
    }

    /// Free every entry in every chain. Requires exclusive access.
    fn clear(&self) {
        for bucket in self.buckets.iter() {
            let mut cur = bucket.load(Ordering::Relaxed);
            while !cur.is_null() {
                // SAFETY: exclusive access; each entry is freed once.
                let next = unsafe { (*cur).next.load(Ordering::Relaxed) };
                drop(unsafe { Box::from_raw(cur) });
                cur = next;
            }
            bucket.store(ptr::null_mut(), Ordering::Relaxed);
        }
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Statistics collected by the string table.
#[derive(Debug, Default)]
pub struct StringTableStats {
    /// Probes through the public lookup/intern paths.
    pub lookups: AtomicU64,
    /// Probes that found an existing entry.
    pub hits: AtomicU64,
    /// New strings interned.
    pub inserts: AtomicU64,
    /// Interns that lost the race and found the winner's entry under
    /// the insert lock.
    pub insert_races: AtomicU64,
    /// Entries unlinked by sweeping.
    pub removed: AtomicU64,
    /// Completed rehashes.
    pub rehashes: AtomicU64,
}

impl StringTableStats {
    /// Print a summary of table activity to stderr.
    pub fn print_summary(&self) {
        eprintln!("=== String Table Statistics ===");
        eprintln!(
            "Lookups:      {} ({} hits)",
            self.lookups.load(Ordering::Relaxed),
            self.hits.load(Ordering::Relaxed)
        );
        eprintln!(
            "Inserts:      {} ({} lost races)",
            self.inserts.load(Ordering::Relaxed),
            self.insert_races.load(Ordering::Relaxed)
        );
        eprintln!("Swept:        {}", self.removed.load(Ordering::Relaxed));
        eprintln!("Rehashes:     {}", self.rehashes.load(Ordering::Relaxed));
    }
}

// =============================================================================
// String table
// =============================================================================

/// The canonical interned-string table.
pub struct StringTable {
    /// Current generation; replaced only at a safepoint by `rehash`.
    core: AtomicPtr<TableCore>,
    /// Serializes insertion of new strings (and exhaustive verification).
    insert_lock: Mutex<()>,
    /// Set by lookups that walk an implausibly long chain.
    needs_rehashing: AtomicBool,
    entry_count: AtomicUsize,
    config: StringTableConfig,
    stats: StringTableStats,
}

// SAFETY: all shared state is atomic or lock-protected; chain mutation
// is confined to the insert lock and safepoint operations.
unsafe impl Send for StringTable {}
unsafe impl Sync for StringTable {}

impl StringTable {
    /// Create an empty table with the default hash function.
    pub fn new(config: StringTableConfig) -> Result<StringTable, TableConfigError> {
        config.validate()?;
        let core = TableCore::new(config.bucket_count, TableHasher::Default);
        Ok(StringTable {
            core: AtomicPtr::new(Box::into_raw(Box::new(core))),
            insert_lock: Mutex::new(()),
            needs_rehashing: AtomicBool::new(false),
            entry_count: AtomicUsize::new(0),
            config,
            stats: StringTableStats::default(),
        })
    }

    /// Activity counters.
    #[inline]
    pub fn stats(&self) -> &StringTableStats {
        &self.stats
    }

    /// Number of interned strings.
    #[inline]
    pub fn len(&self) -> usize {
        self.entry_count.load(Ordering::Relaxed)
    }

    /// Whether the table is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a lookup has requested a rehash since the last one.
    #[inline]
    pub fn needs_rehashing(&self) -> bool {
        self.needs_rehashing.load(Ordering::Acquire)
    }

    #[inline]
    fn current(&self) -> &TableCore {
        // SAFETY: the core pointer is non-null from construction to drop
        // and only replaced at safepoints, when no concurrent caller
        // holds a reference across the swap.
        unsafe { &*self.core.load(Ordering::Acquire) }
    }

    // =========================================================================
    // Lookup and intern
    // =========================================================================

    /// Find an already-interned string. Lock-free.
    pub fn lookup(&self, s: &str) -> Option<StrRef> {
        self.stats.lookups.fetch_add(1, Ordering::Relaxed);
        let core = self.current();
        let hash = core.hasher.hash(s);
        let (found, chain) = core.lookup(hash, s);
        if chain > self.config.rehash_threshold && self.config.use_alternate_hashing {
            self.needs_rehashing.store(true, Ordering::Release);
        }
        if found.is_some() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Intern a string, returning the canonical shared reference.
    ///
    /// Equal contents always yield the same reference: compare interned
    /// strings with `Arc::ptr_eq`.
    pub fn intern(&self, s: &str) -> StrRef {
        if let Some(found) = self.lookup(s) {
            return found;
        }
        // Materialize the candidate before taking the lock; losing the
        // race below just drops it.
        let literal = InternedStr::new(s);
        let _guard = self.insert_lock.lock();
        // The table may have been rebuilt between the failed probe and
        // acquiring the lock, and a racing intern may have won. Resolve
        // the hash and bucket afresh and probe once more before linking.
        let core = self.current();
        let hash = core.hasher.hash(s);
        if let Some(found) = core.lookup(hash, s).0 {
            self.stats.insert_races.fetch_add(1, Ordering::Relaxed);
            return found;
        }
        core.insert(hash, literal.clone());
        self.entry_count.fetch_add(1, Ordering::Relaxed);
        self.stats.inserts.fetch_add(1, Ordering::Relaxed);
        literal
    }

    /// Intern a UTF-16 string, as handed over by guest code.
    ///
    /// Unpaired surrogates are replaced before interning, so malformed
    /// input still canonicalizes deterministically.
    pub fn intern_utf16(&self, units: &[u16]) -> StrRef {
        self.intern(&String::from_utf16_lossy(units))
    }

    /// Visit every interned string. Lock-free; concurrent interns may
    /// or may not be observed.
    pub fn visit_refs(&self, mut visit: impl FnMut(&StrRef)) {
        let core = self.current();
        for bucket in core.buckets.iter() {
            let mut cur = bucket.load(Ordering::Acquire);
            while !cur.is_null() {
                // SAFETY: see `TableCore::lookup`.
                let entry = unsafe { &*cur };
                visit(&entry.literal);
                cur = entry.next.load(Ordering::Acquire);
            }
        }
    }

    /// Parallel visit body: claim bucket chunks until none remain.
    ///
    /// Every worker thread calls this with the same shared claimer at a
    /// safepoint; each entry is visited by exactly one worker.
    pub fn visit_refs_claimed(
        &self,
        _sp: &Safepoint,
        claimer: &BucketClaimer,
        visit: &mut impl FnMut(&StrRef),
    ) {
        let core = self.current();
        while let Some(range) = claimer.claim() {
            for idx in range {
                let mut cur = core.buckets[idx].load(Ordering::Acquire);
                while !cur.is_null() {
                    // SAFETY: see `TableCore::lookup`.
                    let entry = unsafe { &*cur };
                    visit(&entry.literal);
                    cur = entry.next.load(Ordering::Acquire);
                }
            }
        }
    }

    // =========================================================================
    // Sweeping
    // =========================================================================

    /// Unlink entries `is_alive` rejects and visit the survivors.
    ///
    /// Returns (entries processed, entries removed).
    pub fn unlink_or_visit(
        &self,
        sp: &Safepoint,
        is_alive: impl Fn(&StrRef) -> bool,
        mut visit: impl FnMut(&StrRef),
    ) -> (usize, usize) {
        let core = self.current();
        let claimer = BucketClaimer::new(core.buckets.len(), self.config.claim_chunk_size);
        self.sweep_claimed(sp, &claimer, &is_alive, &mut visit)
    }

    /// Parallel sweep body: claim bucket chunks until none remain.
    ///
    /// Every worker thread calls this with the same shared claimer; each
    /// bucket is swept by exactly one worker. Returns this worker's
    /// (processed, removed) contribution.
    pub fn sweep_claimed(
        &self,
        _sp: &Safepoint,
        claimer: &BucketClaimer,
        is_alive: &impl Fn(&StrRef) -> bool,
        visit: &mut impl FnMut(&StrRef),
    ) -> (usize, usize) {
        let core = self.current();
        let mut processed = 0;
        let mut removed = 0;
        while let Some(range) = claimer.claim() {
            for idx in range {
                // SAFETY: the safepoint token stops mutators and the
                // claimer hands each bucket to exactly one worker.
                let (p, r) = unsafe { Self::sweep_bucket(&core.buckets[idx], is_alive, visit) };
                processed += p;
                removed += r;
            }
        }
        self.entry_count.fetch_sub(removed, Ordering::Relaxed);
        self.stats.removed.fetch_add(removed as u64, Ordering::Relaxed);
        (processed, removed)
    }

    /// # Safety
    /// The caller must have exclusive access to this bucket's chain.
    unsafe fn sweep_bucket(
        bucket: &AtomicPtr<Entry>,
        is_alive: &impl Fn(&StrRef) -> bool,
        visit: &mut impl FnMut(&StrRef),
    ) -> (usize, usize) {
        let mut processed = 0;
        let mut removed = 0;
        let mut slot: *const AtomicPtr<Entry> = bucket;
        loop {
            // SAFETY: `slot` points at the bucket head or at the `next`
            // field of a live entry; exclusivity is the caller's contract.
            let cur = unsafe { (*slot).load(Ordering::Acquire) };
            if cur.is_null() {
                break;
            }
            processed += 1;
            // SAFETY: `cur` is a live entry under exclusive access.
            let entry = unsafe { &*cur };
            if is_alive(&entry.literal) {
                visit(&entry.literal);
                slot = &entry.next;
            } else {
                let next = entry.next.load(Ordering::Acquire);
                // SAFETY: unlink before free; nothing reaches `cur` after
                // this store.
                unsafe { (*slot).store(next, Ordering::Release) };
                drop(unsafe { Box::from_raw(cur) });
                removed += 1;
            }
        }
        (processed, removed)
    }

    // =========================================================================
    // Rehashing
    // =========================================================================

    /// Rebuild the table under a freshly seeded alternate hash.
    ///
    /// No-op unless a lookup requested it and alternate hashing is
    /// enabled. Every surviving reference stays valid: entries are
    /// relinked, not reallocated strings. Returns whether a rebuild
    /// happened.
    pub fn rehash(&self, _sp: &Safepoint) -> bool {
        if !self.config.use_alternate_hashing || !self.needs_rehashing() {
            return false;
        }
        let _guard = self.insert_lock.lock();
        let old_ptr = self.core.load(Ordering::Acquire);
        // SAFETY: the safepoint token plus the insert lock give us
        // exclusive access to both generations.
        let old = unsafe { &*old_ptr };

        let new_core = TableCore::new(self.config.bucket_count, old.hasher.rotated());
        for bucket in old.buckets.iter() {
            let mut cur = bucket.load(Ordering::Relaxed);
            while !cur.is_null() {
                // SAFETY: exclusive access; each entry is moved once.
                let entry = unsafe { &*cur };
                let next = entry.next.load(Ordering::Relaxed);
                let hash = new_core.hasher.hash(entry.literal.as_str());
                new_core.insert(hash, entry.literal.clone());
                drop(unsafe { Box::from_raw(cur) });
                cur = next;
            }
            bucket.store(ptr::null_mut(), Ordering::Relaxed);
        }

        self.core
            .store(Box::into_raw(Box::new(new_core)), Ordering::Release);
        // SAFETY: the old core's chains were emptied above.
        drop(unsafe { Box::from_raw(old_ptr) });
        self.needs_rehashing.store(false, Ordering::Release);
        self.stats.rehashes.fetch_add(1, Ordering::Relaxed);
        true
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// One-line usage summary: entries, buckets, chain shape.
    pub fn summary_string(&self) -> String {
        let core = self.current();
        let mut used_buckets = 0usize;
        let mut longest = 0usize;
        for bucket in core.buckets.iter() {
            let mut chain = 0;
            let mut cur = bucket.load(Ordering::Acquire);
            while !cur.is_null() {
                // SAFETY: see `TableCore::lookup`.
                chain += 1;
                cur = unsafe { &*cur }.next.load(Ordering::Acquire);
            }
            if chain > 0 {
                used_buckets += 1;
                longest = longest.max(chain);
            }
        }
        format!(
            "string table: entries={} buckets={} used={} longest_chain={} hash={}",
            self.len(),
            core.buckets.len(),
            used_buckets,
            longest,
            if core.hasher.is_alternate() {
                "alternate"
            } else {
                "default"
            }
        )
    }

    /// Print the usage summary to stderr.
    pub fn print_summary(&self) {
        eprintln!("{}", self.summary_string());
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Check table consistency. Diagnostic; panics on the first issue.
    pub fn verify(&self) {
        let core = self.current();
        let mut counted = 0;
        for (idx, bucket) in core.buckets.iter().enumerate() {
            let mut cur = bucket.load(Ordering::Acquire);
            while !cur.is_null() {
                // SAFETY: see `TableCore::lookup`.
                let entry = unsafe { &*cur };
                counted += 1;
                assert_eq!(
                    entry.hash,
                    core.hasher.hash(entry.literal.as_str()),
                    "stored hash does not match the current hash function"
                );
                assert_eq!(
                    core.bucket_index(entry.hash),
                    idx,
                    "entry chained into the wrong bucket"
                );
                cur = entry.next.load(Ordering::Acquire);
            }
        }
        assert_eq!(counted, self.len(), "entry count drift");
    }

    /// Exhaustive verification: log every inconsistency and keep going.
    ///
    /// Checks hash integrity, bucket placement, and cross-entry
    /// duplicate contents, holding the insert lock so the walk is
    /// stable. Returns the number of failures found.
    pub fn verify_and_compare_entries(&self) -> usize {
        let _guard = self.insert_lock.lock();
        let core = self.current();
        let mut failures = 0;
        let mut seen: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
        let mut counted = 0;

        for (idx, bucket) in core.buckets.iter().enumerate() {
            let mut cur = bucket.load(Ordering::Acquire);
            while !cur.is_null() {
                // SAFETY: insert lock held; chains are stable.
                let entry = unsafe { &*cur };
                counted += 1;
                let expected = core.hasher.hash(entry.literal.as_str());
                if entry.hash != expected {
                    failures += 1;
                    eprintln!(
                        "string table: entry {:?} has hash {:#x}, expected {:#x}",
                        entry.literal.as_str(),
                        entry.hash,
                        expected
                    );
                }
                let home = core.bucket_index(entry.hash);
                if home != idx {
                    failures += 1;
                    eprintln!(
                        "string table: entry {:?} chained in bucket {idx}, belongs in {home}",
                        entry.literal.as_str()
                    );
                }
                if let Some(first) = seen.insert(entry.literal.as_str(), idx) {
                    failures += 1;
                    eprintln!(
                        "string table: duplicate contents {:?} in buckets {first} and {idx}",
                        entry.literal.as_str()
                    );
                }
                cur = entry.next.load(Ordering::Acquire);
            }
        }
        if counted != self.len() {
            failures += 1;
            eprintln!(
                "string table: walked {counted} entries but count says {}",
                self.len()
            );
        }
        failures
    }
}

impl Drop for StringTable {
    fn drop(&mut self) {
        let core_ptr = *self.core.get_mut();
        // SAFETY: drop has exclusive access; the core was never handed out.
        let core = unsafe { &*core_ptr };
        core.clear();
        drop(unsafe { Box::from_raw(core_ptr) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn table() -> StringTable {
        StringTable::new(StringTableConfig::default()).expect("table construction failed")
    }

    #[test]
    fn test_intern_is_canonical() {
        let table = table();
        let a = table.intern("runtime");
        let b = table.intern("runtime");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(table.len(), 1);
        assert!(table.lookup("runtime").is_some());
        assert!(table.lookup("compile").is_none());
    }

    #[test]
    fn test_distinct_contents_distinct_refs() {
        let table = table();
        let a = table.intern("alpha");
        let b = table.intern("beta");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_intern_utf16_canonicalizes_with_utf8() {
        let table = table();
        let a = table.intern("héllo");
        let units: Vec<u16> = "héllo".encode_utf16().collect();
        let b = table.intern_utf16(&units);
        assert!(Arc::ptr_eq(&a, &b));
        // Unpaired surrogate degrades to the replacement character.
        let c = table.intern_utf16(&[0xD800]);
        assert_eq!(c.as_str(), "\u{FFFD}");
    }

    #[test]
    fn test_summary_reports_hash_generation() {
        let table = table();
        table.intern("one");
        table.intern("two");
        let summary = table.summary_string();
        assert!(summary.contains("entries=2"));
        assert!(summary.contains("hash=default"));

        table.needs_rehashing.store(true, Ordering::Release);
        let sp = Safepoint::begin();
        assert!(table.rehash(&sp));
        drop(sp);
        assert!(table.summary_string().contains("hash=alternate"));
    }

    #[test]
    fn test_long_chain_requests_rehash() {
        // One bucket forces every entry onto the same chain.
        let config = StringTableConfig {
            bucket_count: 1,
            rehash_threshold: 4,
            ..Default::default()
        };
        let table = StringTable::new(config).unwrap();
        for i in 0..10 {
            table.intern(&format!("s{i}"));
        }
        assert!(!table.needs_rehashing());
        table.lookup("s0");
        assert!(table.needs_rehashing());
    }

    #[test]
    fn test_rehash_disabled_without_alternate_hashing() {
        let config = StringTableConfig {
            bucket_count: 1,
            rehash_threshold: 2,
            use_alternate_hashing: false,
            ..Default::default()
        };
        let table = StringTable::new(config).unwrap();
        for i in 0..8 {
            table.intern(&format!("s{i}"));
        }
        table.lookup("s0");
        assert!(!table.needs_rehashing());
        let sp = Safepoint::begin();
        assert!(!table.rehash(&sp));
    }

    #[test]
    fn test_rehash_preserves_identity() {
        let config = StringTableConfig {
            bucket_count: 64,
            rehash_threshold: 1,
            ..Default::default()
        };
        let table = StringTable::new(config).unwrap();
        let refs: Vec<_> = (0..200).map(|i| table.intern(&format!("key-{i}"))).collect();

        table.needs_rehashing.store(true, Ordering::Release);
        let sp = Safepoint::begin();
        assert!(table.rehash(&sp));
        drop(sp);
        assert!(!table.needs_rehashing());

        for (i, old) in refs.iter().enumerate() {
            let found = table.lookup(&format!("key-{i}")).expect("entry lost in rehash");
            assert!(Arc::ptr_eq(old, &found));
        }
        table.verify();
        assert_eq!(table.verify_and_compare_entries(), 0);
    }

    #[test]
    fn test_sweep_removes_exactly_the_dead() {
        let table = table();
        let keep: Vec<_> = (0..50).map(|i| table.intern(&format!("keep-{i}"))).collect();
        for i in 0..30 {
            table.intern(&format!("drop-{i}"));
        }

        let sp = Safepoint::begin();
        let mut visited = 0;
        let (processed, removed) = table.unlink_or_visit(
            &sp,
            |s| s.starts_with("keep-"),
            |_| visited += 1,
        );
        drop(sp);

        assert_eq!(processed, 80);
        assert_eq!(removed, 30);
        assert_eq!(visited, 50);
        assert_eq!(table.len(), 50);
        for (i, r) in keep.iter().enumerate() {
            let found = table.lookup(&format!("keep-{i}")).expect("survivor lost");
            assert!(Arc::ptr_eq(r, &found));
        }
        table.verify();
    }

    #[test]
    fn test_verify_passes_on_fresh_table() {
        let table = table();
        for i in 0..100 {
            table.intern(&format!("v{i}"));
        }
        table.verify();
        assert_eq!(table.verify_and_compare_entries(), 0);
    }

    #[test]
    fn test_visit_refs_sees_everything() {
        let table = table();
        for i in 0..25 {
            table.intern(&format!("x{i}"));
        }
        let mut count = 0;
        table.visit_refs(|_| count += 1);
        assert_eq!(count, 25);
    }

    #[test]
    fn test_racing_interns_record_one_insert_per_key() {
        let table = table();
        let keys: Vec<String> = (0..64).map(|i| format!("raced-{i}")).collect();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for k in &keys {
                        table.intern(k);
                    }
                });
            }
        });
        // Losing candidates are discarded, never linked: exactly one
        // insert per key regardless of how the races fell.
        assert_eq!(table.len(), keys.len());
        assert_eq!(
            table.stats().inserts.load(Ordering::Relaxed),
            keys.len() as u64
        );
        assert_eq!(table.verify_and_compare_entries(), 0);
    }

    #[test]
    fn test_parallel_visit_covers_each_entry_once() {
        use std::sync::atomic::AtomicUsize;

        let table = table();
        for i in 0..300 {
            table.intern(&format!("p{i}"));
        }

        let sp = Safepoint::begin();
        let claimer = BucketClaimer::new(table.current().buckets.len(), 32);
        let visited = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    table.visit_refs_claimed(&sp, &claimer, &mut |_| {
                        visited.fetch_add(1, Ordering::Relaxed);
                    });
                });
            }
        });
        drop(sp);
        assert_eq!(visited.load(Ordering::Relaxed), 300);
    }
}
