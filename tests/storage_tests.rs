use song_uploader::storage::models::NewSong;
use song_uploader::storage::{Database, DatabaseError, MetadataStore};

fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    (dir, db)
}

fn new_song(user_id: &str, title: &str) -> NewSong {
    NewSong {
        user_id: user_id.to_string(),
        title: title.to_string(),
        author: "Artist A".to_string(),
        image_path: format!("image-{title}"),
        song_path: format!("song-{title}"),
    }
}

#[test]
fn test_put_and_get_song() {
    let (_dir, db) = test_db();

    let stored = db.put_song(new_song("u1", "one")).unwrap();
    assert!(!stored.id.is_empty());

    let retrieved = db.get_song(&stored.id).unwrap().expect("song should exist");
    assert_eq!(retrieved, stored);
    assert_eq!(retrieved.user_id, "u1");
    assert_eq!(retrieved.song_path, "song-one");
    assert_eq!(retrieved.image_path, "image-one");
}

#[test]
fn test_get_song_not_found() {
    let (_dir, db) = test_db();
    assert!(db.get_song("nonexistent").unwrap().is_none());
}

#[test]
fn test_put_song_rejects_empty_paths() {
    let (_dir, db) = test_db();

    let mut song = new_song("u1", "one");
    song.image_path.clear();

    assert!(matches!(
        db.put_song(song),
        Err(DatabaseError::InvalidRecord(_))
    ));
    assert!(db.list_songs().unwrap().is_empty());
}

#[test]
fn test_list_songs_newest_first() {
    let (_dir, db) = test_db();

    let first = db.put_song(new_song("u1", "first")).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = db.put_song(new_song("u2", "second")).unwrap();

    let songs = db.list_songs().unwrap();
    let ids: Vec<&str> = songs.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
}

#[test]
fn test_list_songs_by_user() {
    let (_dir, db) = test_db();

    let a1 = db.put_song(new_song("alice", "a1")).unwrap();
    db.put_song(new_song("bob", "b1")).unwrap();
    let a2 = db.put_song(new_song("alice", "a2")).unwrap();

    let alice = db.list_songs_by_user("alice").unwrap();
    assert_eq!(alice.len(), 2);
    assert_eq!(alice[0].id, a2.id);
    assert_eq!(alice[1].id, a1.id);

    assert!(db.list_songs_by_user("nobody").unwrap().is_empty());
}

#[test]
fn test_songs_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let stored = {
        let db = Database::open(dir.path()).unwrap();
        db.put_song(new_song("u1", "kept")).unwrap()
    };

    let db = Database::open(dir.path()).unwrap();
    assert_eq!(db.get_song(&stored.id).unwrap(), Some(stored));
}

#[tokio::test]
async fn test_metadata_store_insert() {
    let (_dir, db) = test_db();

    let record = db.insert_song(new_song("u1", "async")).await.unwrap();

    assert_eq!(db.list_songs_by_user("u1").unwrap(), vec![record]);
}
