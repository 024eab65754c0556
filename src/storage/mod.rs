pub mod db;
pub mod models;
mod songs;
mod tables;

pub use db::{Database, DatabaseError};
pub use tables::*;

use async_trait::async_trait;

use models::{NewSong, SongRecord};

/// Structured-record store holding song entries that reference blob paths.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a row into the `songs` table and return it as stored.
    async fn insert_song(&self, song: NewSong) -> Result<SongRecord, DatabaseError>;
}

#[async_trait]
impl MetadataStore for Database {
    async fn insert_song(&self, song: NewSong) -> Result<SongRecord, DatabaseError> {
        self.put_song(song)
    }
}
