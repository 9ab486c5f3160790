use serde::{Deserialize, Serialize};

/// Ephemeral completion record for one production batch.
///
/// Purely observational: the UI polls it, nothing decides on it. The
/// record expires after a fixed retention window and absence is a
/// normal outcome ("no active batch"), never an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductionProgress {
    pub batch_id: String,

    /// 0..=100, monotonically non-decreasing per batch.
    pub percent: u8,

    pub completed_chunks: u32,
    pub total_chunks: u32,

    /// RFC 3339; readers drop records older than the retention window.
    pub updated_at: String,
}
