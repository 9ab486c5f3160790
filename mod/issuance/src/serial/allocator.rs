use std::sync::Arc;

use stamp_core::ServiceError;
use stamp_kv::CounterStore;
use tracing::{info, warn};

use crate::store::IssuanceStore;

/// SerialAllocator hands out gap-free, strictly increasing sequence
/// numbers per year, backed by an atomic [`CounterStore`] and
/// reconciled against the persisted stamp ledger.
///
/// The counter is the single source of truth for "next serial", but it
/// may be rebuilt from nothing (e.g. cache eviction, data loss) while
/// issued stamps already exist. The first increment observed for a
/// year therefore triggers reconciliation: a locking read of the
/// ledger's maximum issued suffix, and a counter overwrite when the
/// ledger is ahead. Callers always receive values strictly greater
/// than anything already issued.
pub struct SerialAllocator {
    counters: Arc<dyn CounterStore>,
    store: Arc<IssuanceStore>,
}

impl SerialAllocator {
    pub fn new(counters: Arc<dyn CounterStore>, store: Arc<IssuanceStore>) -> Self {
        Self { counters, store }
    }

    fn counter_key(year: i32) -> String {
        format!("serial:{year}")
    }

    /// Allocate the next serial suffix for `year`.
    pub fn next(&self, year: i32) -> Result<u64, ServiceError> {
        self.reserve_block(year, 1).map(|(start, _)| start)
    }

    /// Atomically reserve `count` consecutive suffixes for `year`.
    /// Returns `(start, end)` inclusive; the range is contiguous and
    /// exclusively owned by the caller.
    pub fn reserve_block(&self, year: i32, count: u64) -> Result<(u64, u64), ServiceError> {
        if count == 0 {
            return Err(ServiceError::Validation(
                "cannot reserve an empty serial block".into(),
            ));
        }

        let key = Self::counter_key(year);
        let end = self
            .counters
            .increment_by(&key, count)
            .map_err(|e| ServiceError::Storage(format!("serial counter increment: {e}")))?;

        if end == count {
            // First increment ever recorded for this year in the
            // counter's view. The counter may have been reset while
            // stamps already exist, so reconcile against the ledger
            // under a locking read before trusting the low range.
            //
            // Only the caller that observed the counter at 0 runs
            // this; a second caller incrementing between that first
            // increment and the `set` below holds an unreconciled low
            // range, and the `set` can move the counter back past it.
            // Two containments: `reseed` at startup closes the window
            // before traffic, and the ledger's UNIQUE(serial_year,
            // serial_suffix) constraint rejects any duplicate commit
            // that slips through.
            let max_issued = self.store.max_serial_suffix(year, true)?;
            if max_issued > 0 {
                let reconciled_end = max_issued.checked_add(count).ok_or_else(|| {
                    ServiceError::Internal(format!("serial range overflow for year {year}"))
                })?;
                self.counters
                    .set(&key, reconciled_end)
                    .map_err(|e| ServiceError::Storage(format!("serial counter set: {e}")))?;
                warn!(
                    year,
                    max_issued,
                    "serial counter was behind the stamp ledger; reconciled"
                );
                return Ok((max_issued + 1, reconciled_end));
            }
        }

        Ok((end - count + 1, end))
    }

    /// Cold-start recovery: rebuild the counter for `year` from the
    /// stamp ledger. Takes a locking read so a concurrent production
    /// job cannot commit new stamps mid-scan. Never used on the hot
    /// path.
    pub fn reseed(&self, year: i32) -> Result<u64, ServiceError> {
        let key = Self::counter_key(year);
        let max_issued = self.store.max_serial_suffix(year, true)?;
        self.counters
            .set(&key, max_issued)
            .map_err(|e| ServiceError::Storage(format!("serial counter seed: {e}")))?;

        // A ledger maximum above the freshly-seeded counter here means
        // a writer slipped past the lock; halt rather than risk
        // duplicate serials.
        let check = self.store.max_serial_suffix(year, false)?;
        if check > max_issued {
            return Err(ServiceError::Internal(format!(
                "stamp ledger advanced during counter reseed for year {year} \
                 ({check} > {max_issued})"
            )));
        }

        info!(year, max_issued, "serial counter reseeded from ledger");
        Ok(max_issued)
    }

    /// Read the last issued suffix for `year` without allocating.
    pub fn last_issued(&self, year: i32) -> Result<u64, ServiceError> {
        self.counters
            .peek(&Self::counter_key(year))
            .map_err(|e| ServiceError::Storage(format!("serial counter peek: {e}")))
    }
}
