//! End-to-end string table scenarios.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lumen_intern::{BucketClaimer, Safepoint, StringTable, StringTableConfig, StrRef};

#[test]
fn concurrent_interns_agree_on_identity() {
    let table = StringTable::new(StringTableConfig::default()).unwrap();
    let keys: Vec<String> = (0..500).map(|i| format!("shared-{i}")).collect();

    let per_thread: Vec<Vec<StrRef>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| keys.iter().map(|k| table.intern(k)).collect::<Vec<_>>()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    // Every thread must have received the same reference per key.
    let first = &per_thread[0];
    for refs in &per_thread[1..] {
        for (a, b) in first.iter().zip(refs) {
            assert!(Arc::ptr_eq(a, b), "intern returned divergent references");
        }
    }
    assert_eq!(table.len(), keys.len());
    assert_eq!(table.verify_and_compare_entries(), 0);
}

#[test]
fn lookups_race_with_interns() {
    let table = StringTable::new(StringTableConfig::default()).unwrap();
    let pinned = table.intern("pinned");

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for i in 0..5_000 {
                table.intern(&format!("churn-{i}"));
            }
        });
        for _ in 0..3 {
            scope.spawn(|| {
                for _ in 0..5_000 {
                    let found = table.lookup("pinned").expect("pinned entry vanished");
                    assert!(Arc::ptr_eq(&found, &pinned));
                }
            });
        }
    });
    assert_eq!(table.len(), 5_001);
}

#[test]
fn parallel_sweep_partitions_the_table() {
    let table = StringTable::new(StringTableConfig::default()).unwrap();
    for i in 0..2_000 {
        table.intern(&format!("entry-{i}"));
    }

    // Drop every third entry, sweeping with four workers.
    let is_alive = |s: &StrRef| {
        let n: usize = s.trim_start_matches("entry-").parse().unwrap();
        n % 3 != 0
    };

    let sp = Safepoint::begin();
    let claimer = BucketClaimer::new(StringTableConfig::default().bucket_count, 32);
    let processed = AtomicUsize::new(0);
    let removed = AtomicUsize::new(0);
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let mut visited = 0;
                let (p, r) = table.sweep_claimed(&sp, &claimer, &is_alive, &mut |_| visited += 1);
                assert_eq!(visited, p - r);
                processed.fetch_add(p, Ordering::Relaxed);
                removed.fetch_add(r, Ordering::Relaxed);
            });
        }
    });
    drop(sp);

    let expected_removed = (0..2_000).filter(|n| n % 3 == 0).count();
    assert_eq!(processed.load(Ordering::Relaxed), 2_000);
    assert_eq!(removed.load(Ordering::Relaxed), expected_removed);
    assert_eq!(table.len(), 2_000 - expected_removed);

    // Survivors still resolve; the swept entries are gone.
    assert!(table.lookup("entry-1").is_some());
    assert!(table.lookup("entry-3").is_none());
    table.verify();
}

#[test]
fn flood_then_rehash_restores_service() {
    // Tiny table so attacker-shaped load degenerates into one chain.
    let config = StringTableConfig {
        bucket_count: 8,
        rehash_threshold: 50,
        ..Default::default()
    };
    let table = StringTable::new(config).unwrap();
    let refs: Vec<_> = (0..600).map(|i| table.intern(&format!("flood-{i}"))).collect();

    // Dense load over few buckets guarantees an over-threshold chain.
    for i in 0..600 {
        table.lookup(&format!("flood-{i}"));
    }
    assert!(table.needs_rehashing());

    let sp = Safepoint::begin();
    assert!(table.rehash(&sp));
    drop(sp);

    // Identity survives the rebuild.
    for (i, old) in refs.iter().enumerate() {
        let found = table.lookup(&format!("flood-{i}")).expect("entry lost");
        assert!(Arc::ptr_eq(old, &found));
    }
    assert_eq!(table.verify_and_compare_entries(), 0);
}

#[test]
fn sweep_then_reintern_creates_fresh_entries() {
    let table = StringTable::new(StringTableConfig::default()).unwrap();
    let old = table.intern("transient");

    let sp = Safepoint::begin();
    let (_, removed) = table.unlink_or_visit(&sp, |_| false, |_| {});
    drop(sp);
    assert_eq!(removed, 1);
    assert!(table.is_empty());

    // The old reference stays usable; a new intern is a new entry.
    assert_eq!(old.as_str(), "transient");
    let new = table.intern("transient");
    assert!(!Arc::ptr_eq(&old, &new));
}
