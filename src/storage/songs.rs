use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::{NewSong, SongRecord};
use super::tables::*;

impl Database {
    // ========================================================================
    // Song operations
    // ========================================================================

    /// Store a new song record and add it to its uploader's index.
    pub fn put_song(&self, song: NewSong) -> Result<SongRecord, DatabaseError> {
        for (field, value) in [
            ("user_id", &song.user_id),
            ("song_path", &song.song_path),
            ("image_path", &song.image_path),
        ] {
            if value.is_empty() {
                return Err(DatabaseError::InvalidRecord(format!(
                    "{field} must not be empty"
                )));
            }
        }

        let record = SongRecord::from_new(
            uuid::Uuid::new_v4().to_string(),
            song,
            chrono::Utc::now(),
        );

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(SONGS)?;
            let data = rmp_serde::to_vec_named(&record)?;
            table.insert(record.id.as_str(), data.as_slice())?;

            let mut user_table = write_txn.open_table(USER_SONGS)?;
            let mut song_ids: Vec<String> = match user_table.get(record.user_id.as_str())? {
                Some(v) => rmp_serde::from_slice(v.value())?,
                None => Vec::new(),
            };
            song_ids.push(record.id.clone());
            let index_data = rmp_serde::to_vec_named(&song_ids)?;
            user_table.insert(record.user_id.as_str(), index_data.as_slice())?;
        }
        write_txn.commit()?;

        tracing::debug!(song_id = %record.id, user_id = %record.user_id, "Stored song record");
        Ok(record)
    }

    pub fn get_song(&self, id: &str) -> Result<Option<SongRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SONGS)?;

        match table.get(id)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// All songs, newest first.
    pub fn list_songs(&self) -> Result<Vec<SongRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SONGS)?;

        let mut songs = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let song: SongRecord = rmp_serde::from_slice(value.value())?;
            songs.push(song);
        }

        songs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(songs)
    }

    /// Songs uploaded by one user, newest first.
    pub fn list_songs_by_user(&self, user_id: &str) -> Result<Vec<SongRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let user_table = read_txn.open_table(USER_SONGS)?;
        let songs_table = read_txn.open_table(SONGS)?;

        let song_ids: Vec<String> = match user_table.get(user_id)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut songs = Vec::with_capacity(song_ids.len());
        for song_id in song_ids.iter().rev() {
            if let Some(data) = songs_table.get(song_id.as_str())? {
                songs.push(rmp_serde::from_slice(data.value())?);
            }
        }

        Ok(songs)
    }
}
