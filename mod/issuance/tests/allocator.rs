//! Serial allocator properties: uniqueness under concurrency,
//! block contiguity, reconciliation and cold-start recovery.

use std::collections::BTreeSet;
use std::sync::Arc;

use issuance::model::{Stamp, StampStatus};
use issuance::serial::SerialAllocator;
use issuance::store::IssuanceStore;
use stamp_core::new_id;
use stamp_kv::{CounterStore, MemoryStore};
use stamp_sql::{SQLStore, SqliteStore};

fn setup() -> (Arc<MemoryStore>, Arc<IssuanceStore>, SerialAllocator) {
    let sql: Arc<dyn SQLStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let store = Arc::new(IssuanceStore::new(sql).unwrap());
    let counters = Arc::new(MemoryStore::new());
    let allocator = SerialAllocator::new(counters.clone(), Arc::clone(&store));
    (counters, store, allocator)
}

fn ledger_stamp(suffix: u64) -> Stamp {
    Stamp {
        id: new_id(),
        serial_number: format!("KBS-2026-{suffix:06}"),
        qr_code: "{}".into(),
        order_id: "o1".into(),
        taxpayer_id: "tp1".into(),
        product_id: "prod1".into(),
        stamp_type_id: "excise".into(),
        status: StampStatus::Produced,
        production_date: "2026-01-01T00:00:00Z".into(),
        production_batch: "b1".into(),
        produced_by: "op".into(),
        encryption_key: "ab".repeat(32),
        digital_signature: "cd".repeat(32),
    }
}

#[test]
fn concurrent_allocations_cover_exact_range() {
    let (_counters, _store, allocator) = setup();
    let allocator = Arc::new(allocator);

    let workers = 10;
    let per_worker = 1000;
    let mut handles = Vec::new();
    for _ in 0..workers {
        let allocator = Arc::clone(&allocator);
        handles.push(std::thread::spawn(move || {
            let mut seen = Vec::with_capacity(per_worker);
            for _ in 0..per_worker {
                seen.push(allocator.next(2026).unwrap());
            }
            seen
        }));
    }

    let mut all = BTreeSet::new();
    for h in handles {
        for v in h.join().unwrap() {
            assert!(all.insert(v), "duplicate serial suffix {v}");
        }
    }
    let expected: BTreeSet<u64> = (1..=(workers * per_worker) as u64).collect();
    assert_eq!(all, expected);
}

#[test]
fn block_reservation_is_contiguous() {
    let (_counters, _store, allocator) = setup();

    let (start, end) = allocator.reserve_block(2026, 1000).unwrap();
    assert_eq!((start, end), (1, 1000));

    // The next allocation picks up exactly where the block ended.
    assert_eq!(allocator.next(2026).unwrap(), 1001);

    let (start, end) = allocator.reserve_block(2026, 500).unwrap();
    assert_eq!((start, end), (1002, 1501));
}

#[test]
fn empty_block_is_rejected() {
    let (_counters, _store, allocator) = setup();
    assert!(allocator.reserve_block(2026, 0).is_err());
}

#[test]
fn years_are_independent() {
    let (_counters, _store, allocator) = setup();
    assert_eq!(allocator.next(2026).unwrap(), 1);
    assert_eq!(allocator.next(2027).unwrap(), 1);
    assert_eq!(allocator.next(2026).unwrap(), 2);
}

#[test]
fn first_use_reconciles_against_ledger() {
    let (counters, store, allocator) = setup();

    // Ledger already holds stamps up to suffix 7, but the counter is
    // fresh (simulating TTL eviction / data loss).
    store
        .insert_stamps(&[ledger_stamp(1), ledger_stamp(2), ledger_stamp(7)])
        .unwrap();
    assert_eq!(counters.peek("serial:2026").unwrap(), 0);

    // The first allocation must continue past the ledger, not restart.
    assert_eq!(allocator.next(2026).unwrap(), 8);
    assert_eq!(allocator.next(2026).unwrap(), 9);
}

#[test]
fn first_block_reconciles_against_ledger() {
    let (_counters, store, allocator) = setup();
    store.insert_stamps(&[ledger_stamp(2500)]).unwrap();

    let (start, end) = allocator.reserve_block(2026, 1000).unwrap();
    assert_eq!((start, end), (2501, 3500));
}

#[test]
fn reseed_rebuilds_counter_from_ledger() {
    let (counters, store, allocator) = setup();
    store
        .insert_stamps(&[ledger_stamp(41), ledger_stamp(42)])
        .unwrap();

    // Counter drifted below the ledger.
    counters.set("serial:2026", 1).unwrap();
    assert_eq!(allocator.reseed(2026).unwrap(), 42);
    assert_eq!(allocator.next(2026).unwrap(), 43);
}

#[test]
fn reseed_of_empty_year_yields_zero() {
    let (_counters, _store, allocator) = setup();
    assert_eq!(allocator.reseed(2026).unwrap(), 0);
    assert_eq!(allocator.next(2026).unwrap(), 1);
}
