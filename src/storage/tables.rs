use redb::TableDefinition;

/// Song records: uuid -> SongRecord (msgpack)
pub const SONGS: TableDefinition<&str, &[u8]> = TableDefinition::new("songs");

/// Uploader index: user_id -> msgpack Vec of song UUIDs, in insertion order
pub const USER_SONGS: TableDefinition<&str, &[u8]> = TableDefinition::new("user_songs");
