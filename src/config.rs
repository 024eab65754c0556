use std::time::Duration;

use thiserror::Error;

use crate::object_store::validate_key;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    /// Maximum size of a single uploaded file in bytes
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub enum StorageBackend {
    Gcs,
    Local,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for local storage backend
    pub local_storage_path: String,
    /// GCS bucket name (required when backend is gcs)
    pub gcs_bucket: Option<String>,
    /// Path to GCS service account JSON (optional, defaults to ADC)
    pub gcs_credentials_file: Option<String>,
}

/// Settings for the song upload workflow.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub songs_namespace: String,
    pub images_namespace: String,
    /// Cache lifetime attached to every uploaded blob
    pub cache_control: Duration,
    /// Delete blobs left behind when a later stage of the same attempt fails.
    pub compensate_orphans: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            data_dir: "./data".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_storage_path: "./files".to_string(),
            gcs_bucket: None,
            gcs_credentials_file: None,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            songs_namespace: "songs".to_string(),
            images_namespace: "images".to_string(),
            cache_control: Duration::from_secs(3600),
            compensate_orphans: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50 * 1024 * 1024); // 50MB

        let storage_backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "gcs" => StorageBackend::Gcs,
            _ => StorageBackend::Local,
        };

        let local_storage_path =
            std::env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| "./files".to_string());

        let gcs_bucket = std::env::var("GCS_BUCKET").ok();
        let gcs_credentials_file = std::env::var("GCS_CREDENTIALS_FILE").ok();

        let songs_namespace =
            std::env::var("SONGS_NAMESPACE").unwrap_or_else(|_| "songs".to_string());
        let images_namespace =
            std::env::var("IMAGES_NAMESPACE").unwrap_or_else(|_| "images".to_string());

        let cache_seconds: u64 = std::env::var("UPLOAD_CACHE_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3600);

        let compensate_orphans = std::env::var("COMPENSATE_ORPHANS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let config = Config {
            server: ServerConfig {
                bind_address,
                data_dir,
            },
            storage: StorageConfig {
                backend: storage_backend,
                local_storage_path,
                gcs_bucket,
                gcs_credentials_file,
            },
            upload: UploadConfig {
                songs_namespace,
                images_namespace,
                cache_control: Duration::from_secs(cache_seconds),
                compensate_orphans,
            },
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if matches!(self.storage.backend, StorageBackend::Gcs) && self.storage.gcs_bucket.is_none()
        {
            return Err(ConfigError::ValidationError(
                "GCS_BUCKET is required when STORAGE_BACKEND=gcs".to_string(),
            ));
        }

        for (var, namespace) in [
            ("SONGS_NAMESPACE", &self.upload.songs_namespace),
            ("IMAGES_NAMESPACE", &self.upload.images_namespace),
        ] {
            validate_key(namespace)
                .map_err(|e| ConfigError::ValidationError(format!("{var}: {e}")))?;
        }

        if self.upload.songs_namespace == self.upload.images_namespace {
            return Err(ConfigError::ValidationError(
                "SONGS_NAMESPACE and IMAGES_NAMESPACE must differ".to_string(),
            ));
        }

        if self.upload.cache_control.is_zero() {
            return Err(ConfigError::ValidationError(
                "UPLOAD_CACHE_SECONDS must be greater than 0".to_string(),
            ));
        }

        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.upload.compensate_orphans {
            tracing::info!("Orphan compensation enabled: failed attempts delete their blobs");
        }

        Ok(())
    }
}
