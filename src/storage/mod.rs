//! Historical storage.
//!
//! - `traits`: the [`HistoryStore`] capability the pipeline depends on
//! - `persistence`: concrete stores ([`SqliteHistoryStore`])
//! - `sqlite`: shared connection and metrics helpers

// Dropping the connection guard slightly earlier buys nothing here.
#![allow(clippy::significant_drop_tightening)]

pub mod persistence;
pub mod sqlite;
pub mod traits;

pub use persistence::SqliteHistoryStore;
pub use traits::{HistoryStore, InsertOutcome, PostRecord};

use crate::{Error, Result};
use std::path::PathBuf;

/// File name of the default history database.
pub const DEFAULT_DB_FILE: &str = "history.db";

/// Returns the per-user data directory for postsieve.
///
/// # Errors
///
/// Returns an error if the platform data directory cannot be determined.
pub fn get_user_data_dir() -> Result<PathBuf> {
    directories::BaseDirs::new()
        .map(|b| b.data_local_dir().join("postsieve"))
        .ok_or_else(|| Error::OperationFailed {
            operation: "get_user_data_dir".to_string(),
            cause: "Could not determine user data directory".to_string(),
        })
}

/// Returns the default database path (`<data dir>/postsieve/history.db`).
///
/// Falls back to `./history.db` when no data directory is available.
#[must_use]
pub fn default_db_path() -> PathBuf {
    get_user_data_dir().map_or_else(
        |_| PathBuf::from(DEFAULT_DB_FILE),
        |dir| dir.join(DEFAULT_DB_FILE),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_db_path_file_name() {
        let path = default_db_path();
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some(DEFAULT_DB_FILE));
    }
}
