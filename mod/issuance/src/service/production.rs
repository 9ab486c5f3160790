//! Batch production engine.
//!
//! Drives end-to-end stamp generation for one approved order:
//! chunked serial reservation, per-stamp token generation, bulk
//! persistence and progress publication. State machine per order:
//! `APPROVED → PRODUCTION_QUEUED → IN_PRODUCTION → {PRODUCED |
//! PRODUCTION_FAILED}`.

use std::time::{Duration, Instant};

use chrono::Datelike;
use serde::Serialize;
use stamp_core::{new_id, now_rfc3339, ServiceError};
use tracing::{error, info, warn};

use crate::model::{OrderStatus, Stamp, StampOrder, StampStatus};
use crate::serial::format_serial;
use super::StampService;

/// Rough per-stamp generation rate used only for the completion
/// estimate in the preview.
const ESTIMATED_STAMPS_PER_SEC: u64 = 2_000;

/// Tunables for the production engine.
#[derive(Debug, Clone)]
pub struct ProductionConfig {
    /// Fixed organization code embedded in every serial number.
    pub serial_prefix: String,
    /// Units per chunk: one serial-block reservation and one bulk
    /// write per chunk.
    pub chunk_size: u32,
    /// Overall deadline for a single production job.
    pub job_timeout_secs: u64,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            serial_prefix: "KBS".to_string(),
            chunk_size: 1000,
            job_timeout_secs: 3600,
        }
    }
}

impl ProductionConfig {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.serial_prefix.is_empty() || self.serial_prefix.contains('-') {
            return Err(ServiceError::Validation(format!(
                "invalid serial prefix {:?}",
                self.serial_prefix
            )));
        }
        if self.chunk_size == 0 {
            return Err(ServiceError::Validation(
                "chunk_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Non-authoritative estimate returned to the triggering client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionPreview {
    /// Expected first serial, assuming no concurrent batch interleaves.
    pub serial_start: String,
    pub serial_end: String,
    pub quantity: u32,
    pub estimated_completion: String,
}

/// Synchronous response to a production trigger. The batch itself runs
/// asynchronously; clients poll the order status and the progress
/// channel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartProduction {
    pub batch_id: String,
    pub preview: ProductionPreview,
}

/// Outcome of a completed production run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionReport {
    pub stamps_created: u64,
    pub serial_start: String,
    pub serial_end: String,
    pub chunks: u32,
}

impl StampService {
    /// Queue production for an approved order.
    ///
    /// Synchronous precondition checks: a violation aborts with no
    /// state change and no serials consumed. On success the order is
    /// `PRODUCTION_QUEUED` before this returns, so a client polling
    /// immediately afterwards sees a consistent state.
    pub fn start_production(
        &self,
        order_id: &str,
        operator: &str,
    ) -> Result<StartProduction, ServiceError> {
        let mut order = self.store.get_order(order_id)?;

        if order.status != OrderStatus::Approved {
            return Err(ServiceError::Validation(format!(
                "order {} is not approved (current: {})",
                order_id,
                order.status.as_str()
            )));
        }
        if order.quantity == 0 {
            return Err(ServiceError::Validation(format!(
                "order {order_id} has zero quantity"
            )));
        }
        // Idempotency guard: production may only start once per order.
        if self.store.stamps_exist(order_id)? {
            return Err(ServiceError::Conflict(format!(
                "stamps already generated for order {order_id}"
            )));
        }

        // The preview also enforces the serial ceiling, so it runs
        // before any mutation: a rejected trigger leaves the order
        // untouched and recoverable.
        let preview = self.preview(&order)?;

        let batch_id = new_id();
        order.status = OrderStatus::ProductionQueued;
        order.queued_by = Some(operator.to_string());
        order.production_batch = Some(batch_id.clone());
        order.update_at = Some(now_rfc3339());
        self.store.update_order(&order)?;

        info!(order_id, batch_id, quantity = order.quantity, "production queued");

        Ok(StartProduction { batch_id, preview })
    }

    /// Estimate the serial range and completion time for a queued
    /// order. Based on a counter peek, so concurrent batches can shift
    /// the actual range; never authoritative.
    fn preview(&self, order: &StampOrder) -> Result<ProductionPreview, ServiceError> {
        let year = chrono::Utc::now().year();
        let last = self.allocator.last_issued(year)?;
        let quantity = order.quantity as u64;

        let eta_secs = (quantity / ESTIMATED_STAMPS_PER_SEC).max(1) as i64;
        let estimated_completion =
            (chrono::Utc::now() + chrono::Duration::seconds(eta_secs)).to_rfc3339();

        Ok(ProductionPreview {
            serial_start: format_serial(&self.config.serial_prefix, year, last + 1)?,
            serial_end: format_serial(&self.config.serial_prefix, year, last + quantity)?,
            quantity: order.quantity,
            estimated_completion,
        })
    }

    /// Execute the production run for a queued order.
    ///
    /// Runs on a background worker. Chunks already committed when an
    /// error hits are kept (their serials are valid and auditable) and
    /// the order lands in `PRODUCTION_FAILED` with the error recorded. The allocator never reuses a number, so a later
    /// retry continues from where this run stopped instead of
    /// re-issuing serials.
    pub fn run_production(
        &self,
        order_id: &str,
        batch_id: &str,
    ) -> Result<ProductionReport, ServiceError> {
        let mut order = self.store.get_order(order_id)?;
        if order.status != OrderStatus::ProductionQueued {
            return Err(ServiceError::Validation(format!(
                "order {} is not queued for production (current: {})",
                order_id,
                order.status.as_str()
            )));
        }

        order.status = OrderStatus::InProduction;
        order.update_at = Some(now_rfc3339());
        self.store.update_order(&order)?;
        info!(order_id, batch_id, quantity = order.quantity, "production started");

        match self.produce_stamps(&order, batch_id) {
            Ok(report) => {
                order.status = OrderStatus::Produced;
                order.produced_at = Some(now_rfc3339());
                order.update_at = order.produced_at.clone();
                self.store.update_order(&order)?;
                info!(
                    order_id,
                    batch_id,
                    stamps = report.stamps_created,
                    serial_start = %report.serial_start,
                    serial_end = %report.serial_end,
                    "production completed"
                );
                Ok(report)
            }
            Err(e) => {
                error!(order_id, batch_id, error = %e, "production failed");
                order.status = OrderStatus::ProductionFailed;
                order.error = Some(e.to_string());
                order.update_at = Some(now_rfc3339());
                self.store.update_order(&order)?;
                // Drop the progress record so the UI doesn't keep
                // showing a dead batch as in-flight.
                self.clear_progress(batch_id)?;
                Err(e)
            }
        }
    }

    /// The chunk loop. Halts on the first error; committed chunks are
    /// not rolled back.
    fn produce_stamps(
        &self,
        order: &StampOrder,
        batch_id: &str,
    ) -> Result<ProductionReport, ServiceError> {
        let year = chrono::Utc::now().year();
        let quantity = order.quantity as u64;
        let chunk_size = self.config.chunk_size as u64;
        let total_chunks = quantity.div_ceil(chunk_size) as u32;
        let deadline = Instant::now() + Duration::from_secs(self.config.job_timeout_secs);
        let produced_by = order.queued_by.clone().unwrap_or_default();

        let mut first_serial = 0u64;
        let mut last_serial = 0u64;
        let mut created = 0u64;

        for chunk_idx in 0..total_chunks {
            if Instant::now() >= deadline {
                return Err(ServiceError::Timeout(format!(
                    "production exceeded {}s deadline after {} of {} chunks",
                    self.config.job_timeout_secs, chunk_idx, total_chunks
                )));
            }

            let remaining = quantity - created;
            let count = remaining.min(chunk_size);
            let (start, end) = self.allocator.reserve_block(year, count)?;
            if first_serial == 0 {
                first_serial = start;
            }

            let mut stamps = Vec::with_capacity(count as usize);
            for suffix in start..=end {
                let serial_number = format_serial(&self.config.serial_prefix, year, suffix)?;
                let token = self.tokens.generate(&serial_number)?;
                stamps.push(Stamp {
                    id: new_id(),
                    serial_number,
                    qr_code: token.qr_code,
                    order_id: order.id.clone(),
                    taxpayer_id: order.taxpayer_id.clone(),
                    product_id: order.product_id.clone(),
                    stamp_type_id: order.stamp_type_id.clone(),
                    status: StampStatus::Produced,
                    production_date: now_rfc3339(),
                    production_batch: batch_id.to_string(),
                    produced_by: produced_by.clone(),
                    encryption_key: token.encryption_key,
                    digital_signature: token.digital_signature,
                });
            }

            self.store.insert_stamps(&stamps)?;
            created += count;
            last_serial = end;

            // Progress is observational only; a publish failure must
            // not abort a batch that is otherwise committing fine.
            if let Err(e) = self.publish_progress(batch_id, chunk_idx + 1, total_chunks) {
                warn!(batch_id, error = %e, "progress publish failed");
            }
        }

        Ok(ProductionReport {
            stamps_created: created,
            serial_start: format_serial(&self.config.serial_prefix, year, first_serial)?,
            serial_end: format_serial(&self.config.serial_prefix, year, last_serial)?,
            chunks: total_chunks,
        })
    }
}
