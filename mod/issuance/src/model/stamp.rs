use serde::{Deserialize, Serialize};

/// Stamp lifecycle status. Stamps are an append-only ledger: records
/// are created once by production and only `status` moves afterwards
/// (by the field-verification workflow).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StampStatus {
    Produced,
    Verified,
    Void,
}

impl StampStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StampStatus::Produced => "PRODUCED",
            StampStatus::Verified => "VERIFIED",
            StampStatus::Void => "VOID",
        }
    }
}

/// Stamp — one physical/digital unit of tax-stamp inventory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stamp {
    /// UUID primary key.
    pub id: String,

    /// Human-readable unique identifier, `PREFIX-YYYY-NNNNNN`.
    /// Numeric suffixes within a year are gap-free: exactly
    /// `1..max_issued`.
    pub serial_number: String,

    /// Signed QR envelope for offline field verification.
    pub qr_code: String,

    pub order_id: String,
    pub taxpayer_id: String,
    pub product_id: String,
    pub stamp_type_id: String,

    pub status: StampStatus,

    pub production_date: String,

    /// Groups stamps created by one production run.
    pub production_batch: String,

    /// Operator identity that triggered production.
    pub produced_by: String,

    /// Full derived per-stamp key. Only its first 16 hex characters are
    /// embedded in the QR payload; the rest stays server-side for full
    /// verification.
    pub encryption_key: String,

    /// Hex HMAC-SHA256 over the QR payload.
    pub digital_signature: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_json_roundtrip() {
        let s = Stamp {
            id: "st001".into(),
            serial_number: "KBS-2026-000001".into(),
            qr_code: "{}".into(),
            order_id: "order001".into(),
            taxpayer_id: "tp1".into(),
            product_id: "prod1".into(),
            stamp_type_id: "excise".into(),
            status: StampStatus::Produced,
            production_date: "2026-01-01T00:00:00Z".into(),
            production_batch: "batch001".into(),
            produced_by: "operator".into(),
            encryption_key: "ab".repeat(32),
            digital_signature: "cd".repeat(32),
        };
        let json = serde_json::to_string(&s).unwrap();
        let back: Stamp = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }
}
