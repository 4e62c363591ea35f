//! Blob payload writer: one JSON file per captured body, under
//! `blobRoot/<request-id>/{request,response,provider-request,provider-response}.json` (§6).

use std::path::Path;

use serde_json::Value;

use crate::StoreError;

#[derive(Debug, Clone)]
pub struct BlobBodies {
    pub request: Value,
    pub response: Value,
    pub provider_request: Value,
    pub provider_response: Value,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BlobPaths {
    pub request: String,
    pub response: String,
    pub provider_request: String,
    pub provider_response: String,
}

/// Writes all four blobs for `request_id` under `blob_root`, creating the
/// per-request directory if needed.
pub fn write_blobs(blob_root: &Path, request_id: &str, bodies: &BlobBodies) -> Result<BlobPaths, StoreError> {
    let dir = blob_root.join(request_id);
    std::fs::create_dir_all(&dir).map_err(StoreError::Io)?;

    let write_one = |name: &str, value: &Value| -> Result<String, StoreError> {
        let path = dir.join(name);
        let json = serde_json::to_vec_pretty(value).map_err(StoreError::Serialize)?;
        std::fs::write(&path, json).map_err(StoreError::Io)?;
        Ok(path.to_string_lossy().into_owned())
    };

    Ok(BlobPaths {
        request: write_one("request.json", &bodies.request)?,
        response: write_one("response.json", &bodies.response)?,
        provider_request: write_one("provider-request.json", &bodies.provider_request)?,
        provider_response: write_one("provider-response.json", &bodies.provider_response)?,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::{BlobBodies, write_blobs};

    #[test]
    fn writes_four_files_under_request_directory() {
        let dir = tempdir().unwrap();
        let bodies = BlobBodies {
            request: json!({"a": 1}),
            response: json!({"b": 2}),
            provider_request: json!({"c": 3}),
            provider_response: json!({"d": 4}),
        };

        let paths = write_blobs(dir.path(), "req_abc123", &bodies).unwrap();

        assert!(std::path::Path::new(&paths.request).exists());
        assert!(std::path::Path::new(&paths.response).exists());
        assert!(std::path::Path::new(&paths.provider_request).exists());
        assert!(std::path::Path::new(&paths.provider_response).exists());
        assert!(paths.request.contains("req_abc123"));
    }
}
