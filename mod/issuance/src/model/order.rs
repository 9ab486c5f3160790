use serde::{Deserialize, Serialize};

/// Stamp order lifecycle status.
///
/// The production engine owns the transitions
/// `APPROVED → PRODUCTION_QUEUED → IN_PRODUCTION → {PRODUCED |
/// PRODUCTION_FAILED}`. Everything before `APPROVED` belongs to the
/// order-approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Approved,
    Rejected,
    ProductionQueued,
    InProduction,
    Produced,
    ProductionFailed,
}

impl OrderStatus {
    /// Stable string form used for the indexed status column.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Approved => "APPROVED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::ProductionQueued => "PRODUCTION_QUEUED",
            OrderStatus::InProduction => "IN_PRODUCTION",
            OrderStatus::Produced => "PRODUCED",
            OrderStatus::ProductionFailed => "PRODUCTION_FAILED",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// StampOrder — a taxpayer's request for a quantity of stamps for one
/// product. Mutated by the production engine through the production
/// states; terminal state `PRODUCED` or `PRODUCTION_FAILED`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StampOrder {
    /// UUID primary key.
    #[serde(default)]
    pub id: String,

    pub taxpayer_id: String,
    pub product_id: String,
    pub stamp_type_id: String,

    /// Number of stamps requested. Production generates exactly this
    /// many, once.
    pub quantity: u32,

    #[serde(default)]
    pub status: OrderStatus,

    /// Operator who approved the order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,

    /// Operator who triggered production.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued_by: Option<String>,

    /// Batch ID of the production run for this order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production_batch: Option<String>,

    /// Failure message when status is `PRODUCTION_FAILED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub produced_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_at: Option<String>,
}
