//! Progress/status channel.
//!
//! Best-effort visibility into an in-flight batch, stored as a TTL'd
//! kv record. Absence is a normal outcome (the batch finished long
//! ago, never started, or the record expired) and is reported as
//! `None`, never as an error.

use stamp_core::{now_rfc3339, ServiceError};

use crate::model::ProductionProgress;
use super::StampService;

/// Retention window for progress records (2 hours).
pub const PROGRESS_TTL_SECS: i64 = 7200;

fn progress_key(batch_id: &str) -> String {
    format!("progress:{batch_id}")
}

impl StampService {
    /// Publish the completion state after a chunk commits.
    pub fn publish_progress(
        &self,
        batch_id: &str,
        completed_chunks: u32,
        total_chunks: u32,
    ) -> Result<(), ServiceError> {
        let percent = if total_chunks == 0 {
            100
        } else {
            ((completed_chunks as u64 * 100) / total_chunks as u64).min(100) as u8
        };
        let record = ProductionProgress {
            batch_id: batch_id.to_string(),
            percent,
            completed_chunks,
            total_chunks,
            updated_at: now_rfc3339(),
        };
        let data =
            serde_json::to_vec(&record).map_err(|e| ServiceError::Internal(e.to_string()))?;
        self.kv
            .set(&progress_key(batch_id), &data)
            .map_err(|e| ServiceError::Storage(e.to_string()))
    }

    /// Read a batch's progress. `None` means "no active batch".
    pub fn get_progress(
        &self,
        batch_id: &str,
    ) -> Result<Option<ProductionProgress>, ServiceError> {
        let key = progress_key(batch_id);
        let Some(data) = self
            .kv
            .get(&key)
            .map_err(|e| ServiceError::Storage(e.to_string()))?
        else {
            return Ok(None);
        };

        let record: ProductionProgress =
            serde_json::from_slice(&data).map_err(|e| ServiceError::Internal(e.to_string()))?;

        // Expire stale records on read; the kv layer has no native TTL.
        let expired = chrono::DateTime::parse_from_rfc3339(&record.updated_at)
            .map(|t| chrono::Utc::now().signed_duration_since(t).num_seconds() > PROGRESS_TTL_SECS)
            .unwrap_or(true);
        if expired {
            self.kv
                .delete(&key)
                .map_err(|e| ServiceError::Storage(e.to_string()))?;
            return Ok(None);
        }

        Ok(Some(record))
    }

    /// Remove a batch's progress record (called on failure so a dead
    /// batch doesn't keep reading as in-flight).
    pub fn clear_progress(&self, batch_id: &str) -> Result<(), ServiceError> {
        self.kv
            .delete(&progress_key(batch_id))
            .map_err(|e| ServiceError::Storage(e.to_string()))
    }
}
