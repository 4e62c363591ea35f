//! Signature cache (C9): a keyed persistent store for Google "thought
//! signature" blobs, keyed by tool_call id. Concurrent-safe; last-writer-wins;
//! write failures are logged and swallowed (§4.8, §5) — the cache is
//! best-effort, never load-bearing for request correctness.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use rusqlite::Connection;

#[async_trait]
pub trait SignatureCache: Send + Sync {
    async fn store(&self, tool_call_id: String, signature: String);
    async fn batch_retrieve(&self, tool_call_ids: &[String]) -> HashMap<String, String>;
}

/// Default in-process cache. Sufficient when the process owns the only
/// writer; `SqliteSignatureCache` below is used when durability across
/// restarts is required.
#[derive(Default)]
pub struct InMemorySignatureCache {
    entries: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl SignatureCache for InMemorySignatureCache {
    async fn store(&self, tool_call_id: String, signature: String) {
        self.entries.lock().expect("signature cache lock poisoned").insert(tool_call_id, signature);
    }

    async fn batch_retrieve(&self, tool_call_ids: &[String]) -> HashMap<String, String> {
        let entries = self.entries.lock().expect("signature cache lock poisoned");
        tool_call_ids
            .iter()
            .filter_map(|id| entries.get(id).map(|sig| (id.clone(), sig.clone())))
            .collect()
    }
}

/// Durable cache backed by the same SQLite database as the log store, in a
/// dedicated table. Survives process restart; TTL is not required for
/// correctness (§4.8).
pub struct SqliteSignatureCache {
    connection: Mutex<Connection>,
}

impl SqliteSignatureCache {
    pub fn open(connection: Connection) -> rusqlite::Result<Self> {
        connection.execute(
            "CREATE TABLE IF NOT EXISTS thought_signatures (
                tool_call_id TEXT PRIMARY KEY,
                signature TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { connection: Mutex::new(connection) })
    }
}

#[async_trait]
impl SignatureCache for SqliteSignatureCache {
    async fn store(&self, tool_call_id: String, signature: String) {
        let connection = self.connection.lock().expect("signature cache lock poisoned");
        if let Err(err) = connection.execute(
            "INSERT INTO thought_signatures (tool_call_id, signature) VALUES (?1, ?2)
             ON CONFLICT(tool_call_id) DO UPDATE SET signature = excluded.signature",
            (&tool_call_id, &signature),
        ) {
            log::warn!("failed to persist thought signature for {tool_call_id}: {err}");
        }
    }

    async fn batch_retrieve(&self, tool_call_ids: &[String]) -> HashMap<String, String> {
        let connection = self.connection.lock().expect("signature cache lock poisoned");
        let mut out = HashMap::new();

        for id in tool_call_ids {
            let result: rusqlite::Result<String> = connection.query_row(
                "SELECT signature FROM thought_signatures WHERE tool_call_id = ?1",
                [id],
                |row| row.get(0),
            );
            match result {
                Ok(signature) => {
                    out.insert(id.clone(), signature);
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {}
                Err(err) => log::warn!("failed to read thought signature for {id}: {err}"),
            }
        }

        out
    }
}
