//! Interactive registration tokens.
//!
//! A lighter-weight variant used by the taxpayer-facing inline QR flow
//! during registration, independent of the batch scheme. The claims
//! are sealed with ChaCha20-Poly1305, so a tampered or foreign token
//! fails to open.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, KeyInit, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use stamp_core::ServiceError;

/// Claims carried by a registration token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistrationClaims {
    /// Random identifier for this registration session.
    pub uuid: String,
    /// Whole-second Unix issuance timestamp.
    pub issued_at: i64,
}

/// Wire format: `{"n": base64 nonce, "c": base64 ciphertext}`.
#[derive(Debug, Serialize, Deserialize)]
struct SealedToken {
    n: String,
    c: String,
}

/// Seals and opens registration tokens with a key derived from the
/// application secret.
pub struct RegistrationSealer {
    key: [u8; 32],
}

impl RegistrationSealer {
    pub fn new(secret: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        Self {
            key: hasher.finalize().into(),
        }
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new((&self.key).into())
    }

    /// Issue a fresh sealed token.
    pub fn seal(&self) -> Result<String, ServiceError> {
        let claims = RegistrationClaims {
            uuid: uuid::Uuid::new_v4().to_string().replace('-', ""),
            issued_at: chrono::Utc::now().timestamp(),
        };
        self.seal_claims(&claims)
    }

    fn seal_claims(&self, claims: &RegistrationClaims) -> Result<String, ServiceError> {
        let plaintext =
            serde_json::to_vec(claims).map_err(|e| ServiceError::Internal(e.to_string()))?;

        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher()
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|_| ServiceError::Internal("registration token seal failed".into()))?;

        let sealed = SealedToken {
            n: BASE64.encode(nonce_bytes),
            c: BASE64.encode(ciphertext),
        };
        serde_json::to_string(&sealed).map_err(|e| ServiceError::Internal(e.to_string()))
    }

    /// Open a sealed token, rejecting anything tampered with or sealed
    /// under a different secret.
    pub fn open(&self, token: &str) -> Result<RegistrationClaims, ServiceError> {
        let sealed: SealedToken = serde_json::from_str(token)
            .map_err(|_| ServiceError::Validation("malformed registration token".into()))?;

        let nonce_bytes = BASE64
            .decode(&sealed.n)
            .map_err(|_| ServiceError::Validation("malformed registration nonce".into()))?;
        if nonce_bytes.len() != 12 {
            return Err(ServiceError::Validation(
                "malformed registration nonce".into(),
            ));
        }
        let ciphertext = BASE64
            .decode(&sealed.c)
            .map_err(|_| ServiceError::Validation("malformed registration ciphertext".into()))?;

        let plaintext = self
            .cipher()
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
            .map_err(|_| ServiceError::Validation("registration token rejected".into()))?;

        serde_json::from_slice(&plaintext)
            .map_err(|_| ServiceError::Validation("malformed registration claims".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let sealer = RegistrationSealer::new("test-application-secret");
        let token = sealer.seal().unwrap();
        let claims = sealer.open(&token).unwrap();
        assert_eq!(claims.uuid.len(), 32);
        assert!(claims.issued_at > 0);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let sealer = RegistrationSealer::new("test-application-secret");
        let token = sealer.seal().unwrap();

        let mut sealed: serde_json::Value = serde_json::from_str(&token).unwrap();
        let mut ct = BASE64.decode(sealed["c"].as_str().unwrap()).unwrap();
        ct[0] ^= 0x01;
        sealed["c"] = serde_json::Value::String(BASE64.encode(ct));

        assert!(sealer.open(&sealed.to_string()).is_err());
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let a = RegistrationSealer::new("secret-a");
        let b = RegistrationSealer::new("secret-b");
        let token = a.seal().unwrap();
        assert!(b.open(&token).is_err());
    }

    #[test]
    fn tokens_are_unique() {
        let sealer = RegistrationSealer::new("test-application-secret");
        assert_ne!(sealer.seal().unwrap(), sealer.seal().unwrap());
    }
}
