//! End-to-end code cache scenarios.

use lumen_code::{
    BlobKind, BlobState, CodeCache, CodeCacheConfig, CodeCacheError, ParallelClaimer, Safepoint,
};

fn three_segment_cache() -> CodeCache {
    // One heap, exactly three 64-byte segments committed and reserved.
    let config = CodeCacheConfig {
        reserved_size: 64 * 1024,
        initial_size: 64 * 1024,
        expansion_size: 64 * 1024,
        min_free_space: 0,
        segment_size: 64,
        segmented: false,
        non_method_size: 0,
    };
    CodeCache::new(config).expect("cache construction failed")
}

#[test]
fn two_segment_blobs_in_three_segments() {
    let cache = three_segment_cache();

    // Consume all but three segments so exactly three remain.
    let total_segments = 64 * 1024 / 64;
    let filler = cache
        .allocate((total_segments - 3) * 64, BlobKind::Buffer)
        .unwrap();

    let a = cache.allocate(2 * 64, BlobKind::Stub).unwrap();
    let a_base = cache.blob_at(a).unwrap().base;

    // One segment left; a two-segment blob cannot fit.
    assert!(matches!(
        cache.allocate(2 * 64, BlobKind::Stub),
        Err(CodeCacheError::CacheFull(_))
    ));

    // After the free, the same two segments are handed out again.
    cache.free(a).unwrap();
    let b = cache.allocate(2 * 64, BlobKind::Stub).unwrap();
    assert_eq!(cache.blob_at(b).unwrap().base, a_base);

    cache.free(b).unwrap();
    cache.free(filler).unwrap();
    cache.verify();
}

#[test]
fn full_method_lifecycle() {
    let cache = CodeCache::new(CodeCacheConfig::tiny()).unwrap();

    let method = cache
        .allocate(300, BlobKind::Method { profiled: false })
        .unwrap();
    cache.commit(method, &[0x90; 300]).unwrap();
    cache.add_dependency(method, 42).unwrap();
    cache.add_scavenge_root(method).unwrap();

    let blob = cache.blob_at(method).unwrap();
    assert!(blob.is_alive());
    assert_eq!(cache.find_blob(blob.base + 128).unwrap().handle, method);

    // A class redefinition invalidates dependency key 42.
    assert_eq!(cache.mark_for_deoptimization(42), 1);

    let sp = Safepoint::begin();
    assert_eq!(cache.make_marked_not_entrant(&sp), 1);
    assert_eq!(cache.prune_scavenge_roots(&sp), 1);
    assert_eq!(cache.make_marked_zombies(&sp, |_| true), 1);
    let (swept, _) = cache.sweep_zombies(&sp);
    assert_eq!(swept, 1);
    drop(sp);

    assert!(cache.find_blob(blob.base).is_none());
    assert_eq!(cache.method_count(), 0);
    cache.verify();
}

#[test]
fn lock_free_lookup_races_with_allocation() {
    use std::sync::atomic::{AtomicBool, Ordering};

    let cache = CodeCache::new(CodeCacheConfig::tiny()).unwrap();
    let stop = AtomicBool::new(false);

    // Pin one committed blob so lookups always have something to find.
    let pinned = cache.allocate(256, BlobKind::Stub).unwrap();
    cache.commit(pinned, &[0xC3; 256]).unwrap();
    let pinned_base = cache.blob_at(pinned).unwrap().base;

    std::thread::scope(|scope| {
        // Mutator: churns allocations and frees.
        scope.spawn(|| {
            for _ in 0..2_000 {
                if let Ok(h) = cache.allocate(128, BlobKind::Buffer) {
                    let _ = cache.commit(h, &[0x90; 128]);
                    let _ = cache.free(h);
                }
            }
            stop.store(true, Ordering::Release);
        });

        // Readers: lock-free lookups over the whole reservation.
        for _ in 0..3 {
            scope.spawn(|| {
                while !stop.load(Ordering::Acquire) {
                    let blob = cache.find_blob(pinned_base).expect("pinned blob vanished");
                    assert!(blob.contains_address(pinned_base));
                    for offset in (0..16 * 1024).step_by(512) {
                        if let Some(b) = cache.find_blob(pinned_base + offset) {
                            assert!(b.contains_address(pinned_base + offset));
                        }
                    }
                }
            });
        }
    });
    cache.verify();
}

#[test]
fn parallel_workers_cover_snapshot_once() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let cache = CodeCache::new(CodeCacheConfig::tiny()).unwrap();
    for i in 0..100 {
        let kind = if i % 2 == 0 {
            BlobKind::Method { profiled: false }
        } else {
            BlobKind::Stub
        };
        let h = cache.allocate(128, kind).unwrap();
        cache.commit(h, &[0x90; 128]).unwrap();
    }

    let sp = Safepoint::begin();
    let snapshot = cache.snapshot_blobs();
    assert_eq!(snapshot.len(), 100);

    let claimer = ParallelClaimer::with_default_chunk(snapshot.len());
    let methods = AtomicUsize::new(0);
    let others = AtomicUsize::new(0);
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                while let Some(range) = claimer.claim() {
                    for blob in &snapshot[range] {
                        if blob.kind.is_method() {
                            methods.fetch_add(1, Ordering::Relaxed);
                        } else {
                            others.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            });
        }
    });
    drop(sp);

    assert_eq!(methods.load(Ordering::Relaxed), 50);
    assert_eq!(others.load(Ordering::Relaxed), 50);
}

#[test]
fn unloading_then_sweep_reclaims_dead_code() {
    let cache = CodeCache::new(CodeCacheConfig::tiny()).unwrap();
    let mut methods = Vec::new();
    for _ in 0..10 {
        let h = cache
            .allocate(256, BlobKind::Method { profiled: true })
            .unwrap();
        cache.commit(h, &[0x90; 256]).unwrap();
        methods.push(h);
    }

    let survivors: Vec<_> = methods.iter().copied().step_by(2).collect();
    let sp = Safepoint::begin();
    let unloaded = cache.do_unloading(&sp, |blob| survivors.contains(&blob.handle));
    assert_eq!(unloaded, 5);
    let (swept, bytes) = cache.sweep_zombies(&sp);
    assert_eq!(swept, 5);
    assert_eq!(bytes, 5 * 256);
    drop(sp);

    for h in survivors {
        assert_eq!(cache.blob_at(h).unwrap().state, BlobState::Alive);
    }
    assert_eq!(cache.method_count(), 5);
    cache.verify();
}

#[test]
fn summary_reports_every_heap() {
    let cache = CodeCache::new(CodeCacheConfig::default()).unwrap();
    let summary = cache.summary_string();
    assert!(summary.contains("non-method code heap"));
    assert!(summary.contains("profiled method code heap"));
    assert!(summary.contains("non-profiled method code heap"));
    assert!(summary.contains("total:"));
}
