//! Log store (out-of-scope collaborator per §6, modeled here for interface
//! completeness): blob payload writer + SQLite metadata index + ripgrep-backed
//! search. Append-only from many tasks; a single writer serializes disk
//! writes via `LogStore`'s internal mutex (§5).

pub mod blob;
pub mod metadata;
pub mod search;

pub use blob::{BlobBodies, BlobPaths};
pub use metadata::{AppendResult, LogEvent, LogStore};
pub use search::{SearchHit, search};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("log store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("log store database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to serialize blob payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid search pattern: {0}")]
    Regex(#[from] grep_regex::Error),
}
