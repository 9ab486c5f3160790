pub mod order;
pub mod production;
pub mod progress;
pub mod verify;

use std::sync::Arc;

use stamp_core::ServiceError;
use stamp_kv::{CounterStore, KVStore};
use stamp_sql::SQLStore;

use crate::serial::SerialAllocator;
use crate::store::IssuanceStore;
use crate::token::registration::RegistrationSealer;
use crate::token::TokenGenerator;

pub use production::{ProductionConfig, ProductionPreview, ProductionReport, StartProduction};

/// Issuance service — holds the storage backends, the serial
/// allocator and the token generators, and provides all business
/// logic.
pub struct StampService {
    pub(crate) store: Arc<IssuanceStore>,
    pub(crate) kv: Arc<dyn KVStore>,
    pub(crate) allocator: SerialAllocator,
    pub(crate) tokens: TokenGenerator,
    pub(crate) sealer: RegistrationSealer,
    pub(crate) config: ProductionConfig,
}

impl StampService {
    /// Build the service.
    ///
    /// `secret` is the process-wide application secret used for HMAC
    /// signing and key derivation. It must be identical on every
    /// worker and stable across restarts; rotating it invalidates
    /// verification of previously issued material.
    pub fn new(
        sql: Arc<dyn SQLStore>,
        kv: Arc<dyn KVStore>,
        counters: Arc<dyn CounterStore>,
        secret: &str,
        config: ProductionConfig,
    ) -> Result<Self, ServiceError> {
        if secret.is_empty() {
            return Err(ServiceError::Validation(
                "application secret must not be empty".into(),
            ));
        }
        config.validate()?;

        let store = Arc::new(IssuanceStore::new(sql)?);
        let allocator = SerialAllocator::new(counters, Arc::clone(&store));

        Ok(Self {
            store,
            kv,
            allocator,
            tokens: TokenGenerator::new(secret),
            sealer: RegistrationSealer::new(secret),
            config,
        })
    }

    /// Access the underlying store (ledger + orders).
    pub fn store(&self) -> &Arc<IssuanceStore> {
        &self.store
    }

    /// Access the serial allocator (cold-start recovery tooling).
    pub fn allocator(&self) -> &SerialAllocator {
        &self.allocator
    }

    /// Issue an interactive registration token.
    pub fn issue_registration_token(&self) -> Result<String, ServiceError> {
        self.sealer.seal()
    }

    /// Open and validate an interactive registration token.
    pub fn open_registration_token(
        &self,
        token: &str,
    ) -> Result<crate::token::registration::RegistrationClaims, ServiceError> {
        self.sealer.open(token)
    }
}
