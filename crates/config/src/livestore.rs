use serde::Deserialize;

/// Configuration for the mirrored client-visible view built over the embedded SQL store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct LivestoreConfig {
    /// Number of log records batched per write to the mirrored view.
    pub batch_size: usize,
}

impl Default for LivestoreConfig {
    fn default() -> Self {
        Self { batch_size: 50 }
    }
}
