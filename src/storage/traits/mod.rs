//! Storage backend traits.

mod history;

pub use history::{HistoryStore, InsertOutcome, PostRecord};
