mod gcs;
mod local;

pub use gcs::GcsStore;
pub use local::LocalStore;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Object already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Per-upload directives passed to the backend.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub cache_control: Duration,
    pub content_type: String,
    /// When false, an existing object under the same key is an error.
    pub overwrite: bool,
}

impl UploadOptions {
    /// Render the cache directive as a `Cache-Control` header value.
    pub fn cache_control_header(&self) -> String {
        format!("max-age={}", self.cache_control.as_secs())
    }
}

/// Where the backend actually put an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Path relative to the namespace, as normalized by the backend.
    pub path: String,
}

/// Abstraction over blob storage backends.
/// Objects are addressed by namespace + key; the song record is what ties them together.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        namespace: &str,
        key: &str,
        data: Bytes,
        options: &UploadOptions,
    ) -> Result<StoredObject, ObjectStoreError>;
    async fn get(&self, namespace: &str, key: &str) -> Result<Bytes, ObjectStoreError>;
    async fn delete(&self, namespace: &str, key: &str) -> Result<(), ObjectStoreError>;
    async fn exists(&self, namespace: &str, key: &str) -> Result<bool, ObjectStoreError>;
}

/// Check that a namespace or key is a single safe path segment.
pub fn validate_key(key: &str) -> Result<(), ObjectStoreError> {
    if key.is_empty() {
        return Err(ObjectStoreError::InvalidKey("key must not be empty".to_string()));
    }
    if key.contains("..") {
        return Err(ObjectStoreError::InvalidKey(format!(
            "path traversal not allowed: {key}"
        )));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(ObjectStoreError::InvalidKey(format!(
            "unsupported characters in key: {key}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_token_keys() {
        assert!(validate_key("song-3f2a9c").is_ok());
        assert!(validate_key("cover_art.v2").is_ok());
    }

    #[test]
    fn rejects_traversal_and_separators() {
        assert!(validate_key("").is_err());
        assert!(validate_key("..").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("a\\b").is_err());
        assert!(validate_key("song 1").is_err());
    }

    #[test]
    fn cache_header_uses_seconds() {
        let options = UploadOptions {
            cache_control: Duration::from_secs(3600),
            content_type: "audio/mpeg".to_string(),
            overwrite: false,
        };
        assert_eq!(options.cache_control_header(), "max-age=3600");
    }
}
