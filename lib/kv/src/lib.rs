//! Embedded key-value storage: a plain byte-oriented [`KVStore`] and an
//! atomically-incrementable [`CounterStore`], both behind traits so
//! business modules and tests can pick their backend.
//!
//! Backends:
//! - [`RedbStore`] — redb-backed, durable, atomic across processes
//!   sharing the database file.
//! - [`MemoryStore`] — in-process, for tests.

pub mod counter;
pub mod error;
pub mod memory;
pub mod redb_store;
pub mod traits;

pub use counter::CounterStore;
pub use error::KVError;
pub use memory::MemoryStore;
pub use redb_store::RedbStore;
pub use traits::KVStore;
