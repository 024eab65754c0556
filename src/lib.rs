//! song-uploader - Song upload service for a music-sharing application
//!
//! A song is created from four inputs (title, author, audio file, cover image):
//! - Both files are written to blob storage under keys sharing a per-attempt token
//! - A song record referencing the stored paths is then inserted into redb
//! - Swappable blob storage backends (local filesystem, GCS)
//! - REST API with multipart upload and a paginated song listing

pub mod api;
pub mod config;
pub mod object_store;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod upload;

use std::sync::Arc;

use config::Config;
use storage::Database;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub object_store: Arc<dyn object_store::ObjectStore>,
}
