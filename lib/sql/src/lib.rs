//! Embedded SQL storage behind the [`SQLStore`] trait, backed by
//! rusqlite (bundled SQLite, WAL mode).

pub mod error;
pub mod sqlite;
pub mod traits;

pub use error::SQLError;
pub use sqlite::SqliteStore;
pub use traits::{Row, SQLStore, Value};
