use crate::error::KVError;

/// CounterStore provides atomically-incrementable integer counters
/// keyed by an arbitrary string (e.g. `serial:2026`).
///
/// Atomicity contract: two concurrent callers of [`increment`] or
/// [`increment_by`] never observe the same returned value, across all
/// threads and processes sharing the backing store. Serial-number
/// uniqueness depends on this, so implementations must fail with an
/// error when the store is unreachable rather than fall back to a
/// non-atomic path.
///
/// [`increment`]: CounterStore::increment
/// [`increment_by`]: CounterStore::increment_by
pub trait CounterStore: Send + Sync {
    /// Atomically add 1 to the counter and return the new value.
    /// An unset counter starts at 0, so the first increment returns 1.
    fn increment(&self, key: &str) -> Result<u64, KVError> {
        self.increment_by(key, 1)
    }

    /// Atomically add `delta` to the counter and return the new value.
    /// The caller exclusively owns the range `(new - delta, new]`.
    fn increment_by(&self, key: &str, delta: u64) -> Result<u64, KVError>;

    /// Read the current value without mutating. Returns 0 if unset.
    fn peek(&self, key: &str) -> Result<u64, KVError>;

    /// Overwrite the counter. Used only during reconciliation and
    /// cold-start recovery, never on the allocation hot path.
    fn set(&self, key: &str, value: u64) -> Result<(), KVError>;

    /// Remove the counter entirely. Test/reset tooling only.
    fn clear(&self, key: &str) -> Result<(), KVError>;
}
