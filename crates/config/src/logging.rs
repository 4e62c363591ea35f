use serde::Deserialize;

/// Persisted-log store configuration (§6 "Persisted state").
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Path to the SQLite metadata database.
    pub db_path: String,
    /// Directory blob files (request/response/provider-request/provider-response JSON) are written under.
    pub blob_root: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            db_path: "gateway.sqlite3".to_owned(),
            blob_root: "gateway-logs".to_owned(),
        }
    }
}
