use std::sync::Arc;

use stamp_core::{ListParams, ListResult, ServiceError};
use stamp_sql::{Row, SQLStore, Value};

use crate::model::{Stamp, StampOrder};
use crate::serial::parse_serial;

/// SQL schema for the issuance tables.
///
/// Each table stores the full JSON document in a `data` TEXT column,
/// with indexed columns extracted for filtering and uniqueness. The
/// UNIQUE constraints on `serial_number` and `(serial_year,
/// serial_suffix)` are the last line of defence against allocator
/// bugs: a duplicate serial can never be committed.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS stamp_orders (
    id            TEXT PRIMARY KEY,
    data          TEXT NOT NULL,
    taxpayer_id   TEXT NOT NULL,
    product_id    TEXT NOT NULL,
    status        TEXT NOT NULL,
    create_at     TEXT,
    update_at     TEXT
);
CREATE INDEX IF NOT EXISTS idx_order_status ON stamp_orders(status);
CREATE INDEX IF NOT EXISTS idx_order_taxpayer ON stamp_orders(taxpayer_id);

CREATE TABLE IF NOT EXISTS stamps (
    id               TEXT PRIMARY KEY,
    data             TEXT NOT NULL,
    serial_number    TEXT NOT NULL UNIQUE,
    serial_year      INTEGER NOT NULL,
    serial_suffix    INTEGER NOT NULL,
    order_id         TEXT NOT NULL,
    status           TEXT NOT NULL,
    production_batch TEXT NOT NULL,
    create_at        TEXT,
    UNIQUE(serial_year, serial_suffix)
);
CREATE INDEX IF NOT EXISTS idx_stamp_order ON stamps(order_id);
CREATE INDEX IF NOT EXISTS idx_stamp_batch ON stamps(production_batch);
CREATE INDEX IF NOT EXISTS idx_stamp_status ON stamps(status);
";

/// Persistent storage for orders and the append-only stamp ledger,
/// backed by SQLStore (SQLite).
pub struct IssuanceStore {
    db: Arc<dyn SQLStore>,
}

impl IssuanceStore {
    /// Create a new IssuanceStore and initialise the schema.
    pub fn new(db: Arc<dyn SQLStore>) -> Result<Self, ServiceError> {
        db.exec(SCHEMA, &[])
            .map_err(|e| ServiceError::Storage(format!("issuance schema init: {e}")))?;
        Ok(Self { db })
    }

    // ── Orders ──────────────────────────────────────────────────────

    /// Insert a new order.
    pub fn create_order(&self, order: &StampOrder) -> Result<(), ServiceError> {
        let data =
            serde_json::to_string(order).map_err(|e| ServiceError::Internal(e.to_string()))?;

        self.db
            .exec(
                "INSERT INTO stamp_orders \
                 (id, data, taxpayer_id, product_id, status, create_at, update_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                &[
                    Value::Text(order.id.clone()),
                    Value::Text(data),
                    Value::Text(order.taxpayer_id.clone()),
                    Value::Text(order.product_id.clone()),
                    Value::Text(order.status.as_str().to_string()),
                    opt_text(&order.create_at),
                    opt_text(&order.update_at),
                ],
            )
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("UNIQUE constraint") {
                    ServiceError::Conflict(msg)
                } else {
                    ServiceError::Storage(msg)
                }
            })?;
        Ok(())
    }

    /// Get an order by ID.
    pub fn get_order(&self, id: &str) -> Result<StampOrder, ServiceError> {
        let rows = self
            .db
            .query(
                "SELECT data FROM stamp_orders WHERE id = ?1",
                &[Value::Text(id.to_string())],
            )
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

        let row = rows
            .first()
            .ok_or_else(|| ServiceError::NotFound(format!("order {id}")))?;
        row_to_doc(row)
    }

    /// Replace an order's document and indexed columns.
    pub fn update_order(&self, order: &StampOrder) -> Result<(), ServiceError> {
        let data =
            serde_json::to_string(order).map_err(|e| ServiceError::Internal(e.to_string()))?;

        let affected = self
            .db
            .exec(
                "UPDATE stamp_orders SET data = ?1, status = ?2, update_at = ?3 WHERE id = ?4",
                &[
                    Value::Text(data),
                    Value::Text(order.status.as_str().to_string()),
                    opt_text(&order.update_at),
                    Value::Text(order.id.clone()),
                ],
            )
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

        if affected == 0 {
            return Err(ServiceError::NotFound(format!("order {}", order.id)));
        }
        Ok(())
    }

    /// List orders, optionally filtered by status.
    pub fn list_orders(
        &self,
        params: &ListParams,
        status: Option<&str>,
    ) -> Result<ListResult<StampOrder>, ServiceError> {
        let (filter_sql, mut filter_params) = match status {
            Some(s) => (" WHERE status = ?1", vec![Value::Text(s.to_string())]),
            None => ("", Vec::new()),
        };

        let count_rows = self
            .db
            .query(
                &format!("SELECT COUNT(*) AS n FROM stamp_orders{filter_sql}"),
                &filter_params,
            )
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        let total = count_rows
            .first()
            .and_then(|r| r.get_i64("n"))
            .unwrap_or(0) as usize;

        let base = filter_params.len();
        filter_params.push(Value::Integer(params.limit as i64));
        filter_params.push(Value::Integer(params.offset as i64));
        let rows = self
            .db
            .query(
                &format!(
                    "SELECT data FROM stamp_orders{filter_sql} \
                     ORDER BY create_at DESC LIMIT ?{} OFFSET ?{}",
                    base + 1,
                    base + 2
                ),
                &filter_params,
            )
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(row_to_doc(row)?);
        }
        Ok(ListResult { items, total })
    }

    // ── Stamp ledger ────────────────────────────────────────────────

    /// Bulk-insert one chunk of stamps inside a single transaction.
    /// Either the whole chunk commits or none of it does.
    pub fn insert_stamps(&self, stamps: &[Stamp]) -> Result<u64, ServiceError> {
        let mut rows: Vec<Vec<Value>> = Vec::with_capacity(stamps.len());
        for stamp in stamps {
            let parsed = parse_serial(&stamp.serial_number)?;
            let data = serde_json::to_string(stamp)
                .map_err(|e| ServiceError::Internal(e.to_string()))?;
            rows.push(vec![
                Value::Text(stamp.id.clone()),
                Value::Text(data),
                Value::Text(stamp.serial_number.clone()),
                Value::Integer(parsed.year as i64),
                Value::Integer(parsed.suffix as i64),
                Value::Text(stamp.order_id.clone()),
                Value::Text(stamp.status.as_str().to_string()),
                Value::Text(stamp.production_batch.clone()),
                Value::Text(stamp.production_date.clone()),
            ]);
        }

        self.db
            .exec_batch(
                "INSERT INTO stamps \
                 (id, data, serial_number, serial_year, serial_suffix, \
                  order_id, status, production_batch, create_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                &rows,
            )
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("UNIQUE constraint") {
                    ServiceError::Conflict(format!("duplicate serial in ledger: {msg}"))
                } else {
                    ServiceError::Storage(msg)
                }
            })
    }

    /// Whether any stamp exists for the given order.
    pub fn stamps_exist(&self, order_id: &str) -> Result<bool, ServiceError> {
        Ok(self.count_for_order(order_id)? > 0)
    }

    /// Number of stamps committed for the given order.
    pub fn count_for_order(&self, order_id: &str) -> Result<u64, ServiceError> {
        let rows = self
            .db
            .query(
                "SELECT COUNT(*) AS n FROM stamps WHERE order_id = ?1",
                &[Value::Text(order_id.to_string())],
            )
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        Ok(rows.first().and_then(|r| r.get_i64("n")).unwrap_or(0) as u64)
    }

    /// Maximum issued serial suffix for `year`, 0 when none exist.
    ///
    /// With `locked` the scan runs inside an exclusive transaction so
    /// no concurrent production job can commit between this read and
    /// the caller's counter update.
    pub fn max_serial_suffix(&self, year: i32, locked: bool) -> Result<u64, ServiceError> {
        let sql = "SELECT MAX(serial_suffix) AS max_suffix FROM stamps WHERE serial_year = ?1";
        let params = [Value::Integer(year as i64)];
        let rows = if locked {
            self.db.query_locked(sql, &params)
        } else {
            self.db.query(sql, &params)
        }
        .map_err(|e| ServiceError::Storage(format!("serial ledger scan: {e}")))?;

        Ok(rows
            .first()
            .and_then(|r| r.get_i64("max_suffix"))
            .unwrap_or(0) as u64)
    }

    /// List stamps for an order, in serial order.
    pub fn list_stamps_for_order(
        &self,
        order_id: &str,
        params: &ListParams,
    ) -> Result<ListResult<Stamp>, ServiceError> {
        let total = self.count_for_order(order_id)? as usize;
        let rows = self
            .db
            .query(
                "SELECT data FROM stamps WHERE order_id = ?1 \
                 ORDER BY serial_year, serial_suffix LIMIT ?2 OFFSET ?3",
                &[
                    Value::Text(order_id.to_string()),
                    Value::Integer(params.limit as i64),
                    Value::Integer(params.offset as i64),
                ],
            )
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(row_to_doc(row)?);
        }
        Ok(ListResult { items, total })
    }

    /// Look up one stamp by its serial number.
    pub fn get_stamp_by_serial(&self, serial: &str) -> Result<Stamp, ServiceError> {
        let rows = self
            .db
            .query(
                "SELECT data FROM stamps WHERE serial_number = ?1",
                &[Value::Text(serial.to_string())],
            )
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        let row = rows
            .first()
            .ok_or_else(|| ServiceError::NotFound(format!("stamp {serial}")))?;
        row_to_doc(row)
    }
}

fn opt_text(v: &Option<String>) -> Value {
    match v {
        Some(s) => Value::Text(s.clone()),
        None => Value::Null,
    }
}

fn row_to_doc<T: serde::de::DeserializeOwned>(row: &Row) -> Result<T, ServiceError> {
    let data = row
        .get_str("data")
        .ok_or_else(|| ServiceError::Internal("missing data column".into()))?;
    serde_json::from_str(data).map_err(|e| ServiceError::Internal(e.to_string()))
}
