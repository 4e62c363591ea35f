//! SQLite-backed log metadata (§6 "Persisted state"). Blob bodies are
//! written separately by `blob::write_blobs`; this table indexes them.

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use rusqlite::Connection;
use serde_json::Value;

use crate::{
    StoreError,
    blob::{self, BlobBodies, BlobPaths},
};

/// One pipeline exchange, ready to be appended after rendering (§4.4 step f,
/// §9 "Concurrent log writes" — the core must not hold the response on this).
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub request_id: String,
    pub method: String,
    pub url: String,
    pub status_code: u16,
    pub model: String,
    pub provider: String,
    pub operation: String,
    pub request_body: Value,
    pub response_body: Value,
    pub provider_request_body: Value,
    pub provider_response_body: Value,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AppendResult {
    pub id: i64,
    pub paths: BlobPaths,
}

/// Single-writer (via an internal mutex), many-reader log store (§5).
pub struct LogStore {
    connection: Mutex<Connection>,
    blob_root: PathBuf,
}

impl LogStore {
    pub fn open(db_path: impl AsRef<Path>, blob_root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let blob_root = blob_root.into();
        std::fs::create_dir_all(&blob_root).map_err(StoreError::Io)?;

        let connection = Connection::open(db_path).map_err(StoreError::Sqlite)?;
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS log_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    request_id TEXT NOT NULL,
                    method TEXT NOT NULL,
                    url TEXT NOT NULL,
                    status_code INTEGER NOT NULL,
                    model TEXT NOT NULL,
                    provider TEXT NOT NULL,
                    operation TEXT NOT NULL,
                    request_path TEXT NOT NULL,
                    response_path TEXT NOT NULL,
                    provider_request_path TEXT NOT NULL,
                    provider_response_path TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                )",
                [],
            )
            .map_err(StoreError::Sqlite)?;

        Ok(Self { connection: Mutex::new(connection), blob_root })
    }

    /// Writes the blob payloads and inserts the metadata row. Best-effort:
    /// callers should treat failure as loggable, never client-visible (§6).
    pub fn append(&self, event: LogEvent) -> Result<AppendResult, StoreError> {
        let paths = blob::write_blobs(
            &self.blob_root,
            &event.request_id,
            &BlobBodies {
                request: event.request_body,
                response: event.response_body,
                provider_request: event.provider_request_body,
                provider_response: event.provider_response_body,
            },
        )?;

        let connection = self.connection.lock().expect("log store lock poisoned");
        connection
            .execute(
                "INSERT INTO log_entries (
                    request_id, method, url, status_code, model, provider, operation,
                    request_path, response_path, provider_request_path, provider_response_path
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    event.request_id,
                    event.method,
                    event.url,
                    event.status_code,
                    event.model,
                    event.provider,
                    event.operation,
                    paths.request,
                    paths.response,
                    paths.provider_request,
                    paths.provider_response,
                ],
            )
            .map_err(StoreError::Sqlite)?;

        Ok(AppendResult { id: connection.last_insert_rowid(), paths })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::{LogEvent, LogStore};

    #[test]
    fn appends_and_persists_metadata_row() {
        let dir = tempdir().unwrap();
        let store = LogStore::open(dir.path().join("gateway.sqlite3"), dir.path().join("blobs")).unwrap();

        let result = store
            .append(LogEvent {
                request_id: "req_abc123".to_owned(),
                method: "POST".to_owned(),
                url: "/v1/chat/completions".to_owned(),
                status_code: 200,
                model: "gpt-fast".to_owned(),
                provider: "openai".to_owned(),
                operation: "chat".to_owned(),
                request_body: json!({}),
                response_body: json!({}),
                provider_request_body: json!({}),
                provider_response_body: json!({}),
            })
            .unwrap();

        assert!(result.id > 0);
        assert!(std::path::Path::new(&result.paths.request).exists());
    }
}
