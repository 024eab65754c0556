use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A song row as handed to the metadata store, before it is assigned an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSong {
    pub user_id: String,
    pub title: String,
    pub author: String,
    /// Path returned by the blob store for the cover image
    pub image_path: String,
    /// Path returned by the blob store for the audio file
    pub song_path: String,
}

/// A song record stored in redb
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongRecord {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub author: String,
    pub image_path: String,
    pub song_path: String,
    pub created_at: DateTime<Utc>,
}

impl SongRecord {
    pub fn from_new(id: String, song: NewSong, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: song.user_id,
            title: song.title,
            author: song.author,
            image_path: song.image_path,
            song_path: song.song_path,
            created_at,
        }
    }
}
