//! Anti-counterfeiting token generation.
//!
//! Two independent schemes share the application secret:
//! - [`TokenGenerator`] — the batch-production QR envelope: an
//!   HMAC-SHA256 signed payload with a two-tier derived key. The QR
//!   alone is insufficient to re-derive the full key, so a
//!   photographed stamp cannot clone a backend-verifiable identity.
//! - [`RegistrationSealer`](registration::RegistrationSealer) — the
//!   interactive registration variant, an AEAD-sealed `{uuid,
//!   issued_at}` blob.

pub mod registration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use stamp_core::ServiceError;

type HmacSha256 = Hmac<Sha256>;

/// Number of hex characters of the derived key embedded in the QR
/// payload. The remaining characters never leave the ledger.
const PARTIAL_KEY_LEN: usize = 16;

/// The signed plaintext embedded in a stamp's QR code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QrPayload {
    /// Serial number, `PREFIX-YYYY-NNNNNN`.
    pub sn: String,
    /// Issuance timestamp, whole-second Unix epoch.
    pub ts: i64,
    /// Random 128-bit per-stamp nonce (UUIDv4, no dashes).
    pub nonce: String,
    /// First 16 hex characters of the derived per-stamp key.
    pub ek: String,
}

/// The QR wire format: `{"p": base64(payload JSON), "sig": hex hmac}`.
#[derive(Debug, Serialize, Deserialize)]
struct QrEnvelope {
    p: String,
    sig: String,
}

/// Everything the production engine persists for one stamp's security
/// material.
#[derive(Debug, Clone)]
pub struct StampToken {
    /// Serialized QR envelope.
    pub qr_code: String,
    /// Full derived key (64 hex chars), ledger-only.
    pub encryption_key: String,
    /// Hex HMAC-SHA256 over the payload JSON.
    pub digital_signature: String,
}

/// Builds and verifies the per-stamp QR security payload.
pub struct TokenGenerator {
    secret: String,
}

impl TokenGenerator {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
        }
    }

    /// Generate the security material for one stamp.
    pub fn generate(&self, serial_number: &str) -> Result<StampToken, ServiceError> {
        let nonce = uuid::Uuid::new_v4().to_string().replace('-', "");
        let issued_at = chrono::Utc::now().timestamp();

        // encryption_key = SHA-256(serial || salt || secret), hex.
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let mut hasher = Sha256::new();
        hasher.update(serial_number.as_bytes());
        hasher.update(salt);
        hasher.update(self.secret.as_bytes());
        let encryption_key = hex::encode(hasher.finalize());

        let payload = QrPayload {
            sn: serial_number.to_string(),
            ts: issued_at,
            nonce,
            ek: encryption_key[..PARTIAL_KEY_LEN].to_string(),
        };
        let payload_json =
            serde_json::to_string(&payload).map_err(|e| ServiceError::Internal(e.to_string()))?;

        let signature = hex::encode(self.sign(payload_json.as_bytes())?);

        let envelope = QrEnvelope {
            p: BASE64.encode(&payload_json),
            sig: signature.clone(),
        };
        let qr_code =
            serde_json::to_string(&envelope).map_err(|e| ServiceError::Internal(e.to_string()))?;

        Ok(StampToken {
            qr_code,
            encryption_key,
            digital_signature: signature,
        })
    }

    /// Verify a QR envelope's signature and return the embedded
    /// payload. Rejects any envelope whose payload bytes do not match
    /// the HMAC, in constant time.
    pub fn verify(&self, qr_code: &str) -> Result<QrPayload, ServiceError> {
        let envelope: QrEnvelope = serde_json::from_str(qr_code)
            .map_err(|_| ServiceError::Validation("malformed QR envelope".into()))?;

        let payload_json = BASE64
            .decode(&envelope.p)
            .map_err(|_| ServiceError::Validation("malformed QR payload encoding".into()))?;
        let sig = hex::decode(&envelope.sig)
            .map_err(|_| ServiceError::Validation("malformed QR signature".into()))?;

        let mut mac = self.mac()?;
        mac.update(&payload_json);
        mac.verify_slice(&sig)
            .map_err(|_| ServiceError::Validation("QR signature mismatch".into()))?;

        serde_json::from_slice(&payload_json)
            .map_err(|_| ServiceError::Validation("malformed QR payload".into()))
    }

    fn mac(&self) -> Result<HmacSha256, ServiceError> {
        HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| ServiceError::Internal(format!("hmac init: {e}")))
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, ServiceError> {
        let mut mac = self.mac()?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-application-secret";

    #[test]
    fn generate_produces_consistent_material() {
        let tg = TokenGenerator::new(SECRET);
        let token = tg.generate("KBS-2026-000001").unwrap();

        // Full key is 64 hex chars; payload carries only the first 16.
        assert_eq!(token.encryption_key.len(), 64);
        let payload = tg.verify(&token.qr_code).unwrap();
        assert_eq!(payload.sn, "KBS-2026-000001");
        assert_eq!(payload.ek, token.encryption_key[..16]);
        assert_eq!(payload.nonce.len(), 32);
        assert!(payload.ts > 0);
    }

    #[test]
    fn signature_matches_recomputed_hmac() {
        let tg = TokenGenerator::new(SECRET);
        let token = tg.generate("KBS-2026-000002").unwrap();

        let envelope: serde_json::Value = serde_json::from_str(&token.qr_code).unwrap();
        let payload_json = BASE64
            .decode(envelope["p"].as_str().unwrap())
            .unwrap();

        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(&payload_json);
        let expected = hex::encode(mac.finalize().into_bytes());
        assert_eq!(envelope["sig"].as_str().unwrap(), expected);
        assert_eq!(token.digital_signature, expected);
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let tg = TokenGenerator::new(SECRET);
        let token = tg.generate("KBS-2026-000003").unwrap();

        let mut envelope: serde_json::Value = serde_json::from_str(&token.qr_code).unwrap();
        let payload_json = BASE64
            .decode(envelope["p"].as_str().unwrap())
            .unwrap();
        let tampered = String::from_utf8(payload_json)
            .unwrap()
            .replace("000003", "000004");
        envelope["p"] = serde_json::Value::String(BASE64.encode(tampered));

        let result = tg.verify(&envelope.to_string());
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issuer = TokenGenerator::new(SECRET);
        let verifier = TokenGenerator::new("other-secret");
        let token = issuer.generate("KBS-2026-000005").unwrap();
        assert!(verifier.verify(&token.qr_code).is_err());
    }

    #[test]
    fn keys_differ_per_stamp() {
        let tg = TokenGenerator::new(SECRET);
        let a = tg.generate("KBS-2026-000006").unwrap();
        let b = tg.generate("KBS-2026-000006").unwrap();
        // Random salt: same serial never yields the same key.
        assert_ne!(a.encryption_key, b.encryption_key);
    }

    #[test]
    fn malformed_envelopes_are_rejected() {
        let tg = TokenGenerator::new(SECRET);
        assert!(tg.verify("not json").is_err());
        assert!(tg.verify("{\"p\": \"!!!\", \"sig\": \"00\"}").is_err());
        assert!(tg.verify("{\"p\": \"e30=\", \"sig\": \"zz\"}").is_err());
    }
}
