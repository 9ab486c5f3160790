//! End-to-end production engine tests: chunking, state transitions,
//! idempotency, partial failure and progress.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::Datelike;

use issuance::model::{OrderStatus, StampOrder};
use issuance::service::order::CreateOrderInput;
use issuance::service::{ProductionConfig, StampService};
use stamp_core::{ListParams, ServiceError};
use stamp_kv::{CounterStore, KVStore, MemoryStore};
use stamp_sql::{Row, SQLError, SQLStore, SqliteStore, Value};

const SECRET: &str = "test-application-secret";

fn config(chunk_size: u32) -> ProductionConfig {
    ProductionConfig {
        serial_prefix: "KBS".into(),
        chunk_size,
        job_timeout_secs: 3600,
    }
}

fn make_service(sql: Arc<dyn SQLStore>, cfg: ProductionConfig) -> (Arc<StampService>, Arc<MemoryStore>) {
    let mem = Arc::new(MemoryStore::new());
    let kv: Arc<dyn KVStore> = mem.clone();
    let counters: Arc<dyn CounterStore> = mem.clone();
    let svc = StampService::new(sql, kv, counters, SECRET, cfg).unwrap();
    (Arc::new(svc), mem)
}

fn approved_order(svc: &StampService, quantity: u32) -> StampOrder {
    let order = svc
        .create_order(CreateOrderInput {
            taxpayer_id: "tp1".into(),
            product_id: "prod1".into(),
            stamp_type_id: "excise".into(),
            quantity,
        })
        .unwrap();
    svc.approve_order(&order.id, "inspector").unwrap()
}

#[test]
fn end_to_end_2500_in_chunks_of_1000() {
    let sql: Arc<dyn SQLStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let (svc, _mem) = make_service(sql, config(1000));
    let year = chrono::Utc::now().year();

    let order = approved_order(&svc, 2500);
    let start = svc.start_production(&order.id, "operator").unwrap();

    // Queued synchronously, before any asynchronous work.
    assert_eq!(
        svc.get_order(&order.id).unwrap().status,
        OrderStatus::ProductionQueued
    );
    assert_eq!(start.preview.serial_start, format!("KBS-{year}-000001"));
    assert_eq!(start.preview.serial_end, format!("KBS-{year}-002500"));

    let report = svc.run_production(&order.id, &start.batch_id).unwrap();
    assert_eq!(report.stamps_created, 2500);
    assert_eq!(report.chunks, 3);
    assert_eq!(report.serial_start, format!("KBS-{year}-000001"));
    assert_eq!(report.serial_end, format!("KBS-{year}-002500"));

    let done = svc.get_order(&order.id).unwrap();
    assert_eq!(done.status, OrderStatus::Produced);
    assert!(done.produced_at.is_some());

    // All 2500 stamps exist, in serial order, signed and keyed.
    let stamps = svc
        .list_order_stamps(&order.id, &ListParams { limit: 3000, offset: 0 })
        .unwrap();
    assert_eq!(stamps.total, 2500);
    assert_eq!(stamps.items[0].serial_number, format!("KBS-{year}-000001"));
    assert_eq!(
        stamps.items[2499].serial_number,
        format!("KBS-{year}-002500")
    );
    assert_eq!(stamps.items[0].produced_by, "operator");
    assert_eq!(stamps.items[0].encryption_key.len(), 64);

    // The final progress record reads 100%.
    let progress = svc.get_progress(&start.batch_id).unwrap().unwrap();
    assert_eq!(progress.percent, 100);
    assert_eq!(progress.completed_chunks, 3);
    assert_eq!(progress.total_chunks, 3);
}

#[test]
fn produced_stamps_verify_against_ledger() {
    let sql: Arc<dyn SQLStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let (svc, _mem) = make_service(sql, config(10));

    let order = approved_order(&svc, 5);
    let start = svc.start_production(&order.id, "operator").unwrap();
    svc.run_production(&order.id, &start.batch_id).unwrap();

    let stamps = svc
        .list_order_stamps(&order.id, &ListParams::default())
        .unwrap();
    let result = svc.verify_qr(&stamps.items[0].qr_code).unwrap();
    assert!(result.valid);
    assert_eq!(
        result.stamp.unwrap().serial_number,
        stamps.items[0].serial_number
    );

    // A tampered QR fails verification.
    let tampered = stamps.items[0].qr_code.replace("\"sig\":\"", "\"sig\":\"00");
    let result = svc.verify_qr(&tampered).unwrap();
    assert!(!result.valid);
}

#[test]
fn preconditions_reject_without_side_effects() {
    let sql: Arc<dyn SQLStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let (svc, mem) = make_service(sql, config(1000));

    // Not approved.
    let pending = svc
        .create_order(CreateOrderInput {
            taxpayer_id: "tp1".into(),
            product_id: "prod1".into(),
            stamp_type_id: "excise".into(),
            quantity: 10,
        })
        .unwrap();
    assert!(matches!(
        svc.start_production(&pending.id, "operator"),
        Err(ServiceError::Validation(_))
    ));
    assert_eq!(
        svc.get_order(&pending.id).unwrap().status,
        OrderStatus::Pending
    );

    // No serials were consumed by the rejected trigger.
    let year = chrono::Utc::now().year();
    assert_eq!(mem.peek(&format!("serial:{year}")).unwrap(), 0);
}

#[test]
fn serial_ceiling_rejection_leaves_order_approved() {
    let sql: Arc<dyn SQLStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let (svc, mem) = make_service(sql, config(1000));
    let year = chrono::Utc::now().year();

    // 2000 more units would cross the 999,999 suffix ceiling.
    CounterStore::set(&*mem, &format!("serial:{year}"), 999_000).unwrap();

    let order = approved_order(&svc, 2000);
    assert!(matches!(
        svc.start_production(&order.id, "operator"),
        Err(ServiceError::Validation(_))
    ));

    // The rejected trigger must leave the order recoverable: still
    // APPROVED, no batch recorded, counter untouched.
    let after = svc.get_order(&order.id).unwrap();
    assert_eq!(after.status, OrderStatus::Approved);
    assert!(after.production_batch.is_none());
    assert_eq!(mem.peek(&format!("serial:{year}")).unwrap(), 999_000);
}

#[test]
fn retrigger_on_order_with_stamps_is_rejected() {
    let sql: Arc<dyn SQLStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let (svc, _mem) = make_service(sql, config(10));

    let order = approved_order(&svc, 20);
    let start = svc.start_production(&order.id, "operator").unwrap();
    svc.run_production(&order.id, &start.batch_id).unwrap();

    // Force the order back to APPROVED to isolate the stamp guard.
    let mut produced = svc.get_order(&order.id).unwrap();
    produced.status = OrderStatus::Approved;
    svc.store().update_order(&produced).unwrap();

    assert!(matches!(
        svc.start_production(&order.id, "operator"),
        Err(ServiceError::Conflict(_))
    ));
    assert_eq!(svc.store().count_for_order(&order.id).unwrap(), 20);
}

/// SQLStore wrapper that injects a failure on the nth bulk write.
struct FailingStore {
    inner: SqliteStore,
    fail_on: u32,
    batch_calls: AtomicU32,
}

impl SQLStore for FailingStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        self.inner.query(sql, params)
    }

    fn query_locked(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        self.inner.query_locked(sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        self.inner.exec(sql, params)
    }

    fn exec_batch(&self, sql: &str, rows: &[Vec<Value>]) -> Result<u64, SQLError> {
        let call = self.batch_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(SQLError::Execution("injected chunk failure".into()));
        }
        self.inner.exec_batch(sql, rows)
    }
}

#[test]
fn partial_failure_keeps_committed_chunks() {
    let sql: Arc<dyn SQLStore> = Arc::new(FailingStore {
        inner: SqliteStore::open_in_memory().unwrap(),
        fail_on: 3,
        batch_calls: AtomicU32::new(0),
    });
    let (svc, _mem) = make_service(sql, config(1000));
    let year = chrono::Utc::now().year();

    // 5 chunks of 1000; the 3rd bulk write fails.
    let order = approved_order(&svc, 5000);
    let start = svc.start_production(&order.id, "operator").unwrap();
    let err = svc.run_production(&order.id, &start.batch_id).unwrap_err();
    assert!(err.to_string().contains("injected chunk failure"));

    let failed = svc.get_order(&order.id).unwrap();
    assert_eq!(failed.status, OrderStatus::ProductionFailed);
    assert!(failed.error.is_some());

    // Exactly the two committed chunks survive, contiguous from 1.
    assert_eq!(svc.store().count_for_order(&order.id).unwrap(), 2000);
    let stamps = svc
        .list_order_stamps(&order.id, &ListParams { limit: 2500, offset: 0 })
        .unwrap();
    assert_eq!(stamps.items[0].serial_number, format!("KBS-{year}-000001"));
    assert_eq!(
        stamps.items[1999].serial_number,
        format!("KBS-{year}-002000")
    );

    // The progress record was cleared on failure.
    assert!(svc.get_progress(&start.batch_id).unwrap().is_none());
}

#[test]
fn timed_out_job_fails_the_order() {
    let sql: Arc<dyn SQLStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let cfg = ProductionConfig {
        serial_prefix: "KBS".into(),
        chunk_size: 10,
        job_timeout_secs: 0,
    };
    let (svc, _mem) = make_service(sql, cfg);

    let order = approved_order(&svc, 100);
    let start = svc.start_production(&order.id, "operator").unwrap();
    let err = svc.run_production(&order.id, &start.batch_id).unwrap_err();
    assert!(matches!(err, ServiceError::Timeout(_)));
    assert_eq!(
        svc.get_order(&order.id).unwrap().status,
        OrderStatus::ProductionFailed
    );
    assert_eq!(svc.store().count_for_order(&order.id).unwrap(), 0);
}

#[test]
fn run_requires_queued_status() {
    let sql: Arc<dyn SQLStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let (svc, _mem) = make_service(sql, config(10));
    let order = approved_order(&svc, 10);
    // Never queued.
    assert!(matches!(
        svc.run_production(&order.id, "batch000"),
        Err(ServiceError::Validation(_))
    ));
}

#[test]
fn progress_absence_and_ttl() {
    let sql: Arc<dyn SQLStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let (svc, mem) = make_service(sql, config(1000));

    // Unknown batch reads as "no active batch".
    assert!(svc.get_progress("nope").unwrap().is_none());

    // A record older than the retention window expires on read.
    let stale = serde_json::json!({
        "batchId": "old",
        "percent": 40,
        "completedChunks": 2,
        "totalChunks": 5,
        "updatedAt": "2020-01-01T00:00:00+00:00",
    });
    KVStore::set(&*mem, "progress:old", stale.to_string().as_bytes()).unwrap();
    assert!(svc.get_progress("old").unwrap().is_none());
    // And the expired record is gone.
    assert_eq!(mem.get("progress:old").unwrap(), None);
}

#[test]
fn publish_progress_percentages_are_monotonic() {
    let sql: Arc<dyn SQLStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let (svc, _mem) = make_service(sql, config(1000));

    let mut last = 0;
    for completed in 1..=3 {
        svc.publish_progress("b", completed, 3).unwrap();
        let p = svc.get_progress("b").unwrap().unwrap();
        assert!(p.percent >= last);
        last = p.percent;
    }
    assert_eq!(last, 100);
}
