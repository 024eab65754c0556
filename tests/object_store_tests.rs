use std::time::Duration;

use bytes::Bytes;
use song_uploader::object_store::{LocalStore, ObjectStore, ObjectStoreError, UploadOptions};

fn options(overwrite: bool) -> UploadOptions {
    UploadOptions {
        cache_control: Duration::from_secs(3600),
        content_type: "audio/mpeg".to_string(),
        overwrite,
    }
}

#[tokio::test]
async fn test_local_store_upload_get() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    let data = Bytes::from("ID3 fake mp3");
    let stored = store
        .upload("songs", "song-abc", data.clone(), &options(false))
        .await
        .unwrap();
    assert_eq!(stored.path, "song-abc");

    let retrieved = store.get("songs", "song-abc").await.unwrap();
    assert_eq!(retrieved, data);
    assert!(dir.path().join("songs").join("song-abc").exists());
}

#[tokio::test]
async fn test_local_store_refuses_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store
        .upload("songs", "song-dup", Bytes::from("first"), &options(false))
        .await
        .unwrap();
    let result = store
        .upload("songs", "song-dup", Bytes::from("second"), &options(false))
        .await;

    assert!(matches!(result, Err(ObjectStoreError::AlreadyExists(_))));
    assert_eq!(
        store.get("songs", "song-dup").await.unwrap(),
        Bytes::from("first")
    );
}

#[tokio::test]
async fn test_local_store_overwrite_when_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store
        .upload("images", "image-1", Bytes::from("first"), &options(true))
        .await
        .unwrap();
    store
        .upload("images", "image-1", Bytes::from("second"), &options(true))
        .await
        .unwrap();

    let data = store.get("images", "image-1").await.unwrap();
    assert_eq!(data, Bytes::from("second"));
}

#[tokio::test]
async fn test_local_store_namespaces_are_separate() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    store
        .upload("songs", "same-key", Bytes::from("audio"), &options(false))
        .await
        .unwrap();
    store
        .upload("images", "same-key", Bytes::from("image"), &options(false))
        .await
        .unwrap();

    assert_eq!(
        store.get("images", "same-key").await.unwrap(),
        Bytes::from("image")
    );
}

#[tokio::test]
async fn test_local_store_exists_and_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    assert!(!store.exists("songs", "missing").await.unwrap());

    store
        .upload("songs", "present", Bytes::from("data"), &options(false))
        .await
        .unwrap();
    assert!(store.exists("songs", "present").await.unwrap());

    store.delete("songs", "present").await.unwrap();
    assert!(!store.exists("songs", "present").await.unwrap());

    // Deleting a nonexistent key should not error
    store.delete("songs", "present").await.unwrap();
}

#[tokio::test]
async fn test_local_store_get_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path()).unwrap();

    let result = store.get("songs", "missing").await;
    assert!(matches!(result, Err(ObjectStoreError::NotFound(_))));
}

#[tokio::test]
async fn test_local_store_rejects_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path().join("root")).unwrap();

    let result = store
        .upload("..", "escape", Bytes::from("x"), &options(false))
        .await;
    assert!(matches!(result, Err(ObjectStoreError::InvalidKey(_))));

    let result = store
        .upload("songs", "../../escape", Bytes::from("x"), &options(false))
        .await;
    assert!(matches!(result, Err(ObjectStoreError::InvalidKey(_))));
    assert!(!dir.path().join("escape").exists());
}
