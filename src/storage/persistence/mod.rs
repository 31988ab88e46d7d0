//! History store implementations.

mod sqlite;

pub use sqlite::SqliteHistoryStore;
