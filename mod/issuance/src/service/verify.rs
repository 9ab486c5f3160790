//! Field verification of scanned stamps.

use serde::Serialize;
use stamp_core::{ListParams, ListResult, ServiceError};

use crate::model::Stamp;
use crate::token::QrPayload;
use super::StampService;

/// Result of verifying a scanned QR code.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    /// Signature checked out and the payload is well-formed.
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<QrPayload>,
    /// The matching ledger record, when one exists. A valid signature
    /// with no ledger record means the QR was minted with the real
    /// secret but the stamp was never issued, which is worth flagging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stamp: Option<Stamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StampService {
    /// Verify a scanned QR envelope against the signature and the
    /// ledger.
    pub fn verify_qr(&self, qr_code: &str) -> Result<VerifyResult, ServiceError> {
        let payload = match self.tokens.verify(qr_code) {
            Ok(p) => p,
            Err(ServiceError::Validation(reason)) => {
                return Ok(VerifyResult {
                    valid: false,
                    payload: None,
                    stamp: None,
                    reason: Some(reason),
                });
            }
            Err(e) => return Err(e),
        };

        let stamp = match self.store.get_stamp_by_serial(&payload.sn) {
            Ok(s) => Some(s),
            Err(ServiceError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };

        // The embedded partial key must match the ledger's full key.
        if let Some(ref s) = stamp {
            if !s.encryption_key.starts_with(&payload.ek) {
                return Ok(VerifyResult {
                    valid: false,
                    payload: Some(payload),
                    stamp: None,
                    reason: Some("embedded key does not match ledger".into()),
                });
            }
        }

        Ok(VerifyResult {
            valid: true,
            payload: Some(payload),
            stamp,
            reason: None,
        })
    }

    /// Look up one stamp by serial number.
    pub fn get_stamp(&self, serial: &str) -> Result<Stamp, ServiceError> {
        self.store.get_stamp_by_serial(serial)
    }

    /// List the stamps generated for an order, in serial order.
    pub fn list_order_stamps(
        &self,
        order_id: &str,
        params: &ListParams,
    ) -> Result<ListResult<Stamp>, ServiceError> {
        self.store.list_stamps_for_order(order_id, params)
    }
}
