//! Issuance module — tax-stamp orders, serial-number allocation and
//! batch stamp production.
//!
//! The engineering core lives in three places:
//! - [`serial`] — the gap-free, year-scoped serial allocator backed by
//!   an atomic counter store, self-healing against counter resets.
//! - [`token`] — the per-stamp anti-counterfeiting payload: an
//!   HMAC-signed QR envelope with a two-tier derived key, plus the
//!   AEAD-sealed registration token variant.
//! - [`service`] — the batch production engine driving chunked
//!   generation, bulk persistence and progress publication.

pub mod api;
pub mod model;
pub mod serial;
pub mod service;
pub mod store;
pub mod token;

use std::sync::Arc;

use axum::Router;
use stamp_core::Module;

use service::StampService;

/// Issuance module — stamp orders and production.
pub struct IssuanceModule {
    service: Arc<StampService>,
}

impl IssuanceModule {
    pub fn new(service: Arc<StampService>) -> Self {
        Self { service }
    }
}

impl Module for IssuanceModule {
    fn name(&self) -> &str {
        "issuance"
    }

    fn routes(&self) -> Router {
        api::router(self.service.clone())
    }
}
