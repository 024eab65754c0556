//! In-memory collaborators for upload workflow tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;

use crate::config::UploadConfig;
use crate::object_store::{ObjectStore, ObjectStoreError, StoredObject, UploadOptions};
use crate::storage::models::{NewSong, SongRecord};
use crate::storage::{DatabaseError, MetadataStore};
use crate::upload::{
    MediaFile, NotificationLog, PresentationSurface, StaticSession, SurfaceSignals,
    UploadOrchestrator,
};

/// Ordered record of every store call, shared by the fakes below.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: String) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Reject,
    Panic,
    EmptyPath,
}

/// Blob store backed by a map, with per-namespace fault injection.
#[derive(Default)]
pub struct MemoryBlobs {
    pub log: CallLog,
    objects: Mutex<HashMap<(String, String), (Bytes, UploadOptions)>>,
    faults: Mutex<HashMap<String, Fault>>,
    /// Namespaces whose uploads wait on `gate` before completing.
    gated: Mutex<HashSet<String>>,
    pub gate: Notify,
}

impl MemoryBlobs {
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn fail(&self, namespace: &str, fault: Fault) {
        self.faults
            .lock()
            .unwrap()
            .insert(namespace.to_string(), fault);
    }

    pub fn hold(&self, namespace: &str) {
        self.gated.lock().unwrap().insert(namespace.to_string());
    }

    pub fn contains(&self, namespace: &str, key: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(&(namespace.to_string(), key.to_string()))
    }

    pub fn options(&self, namespace: &str, key: &str) -> Option<UploadOptions> {
        self.objects
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), key.to_string()))
            .map(|(_, o)| o.clone())
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryBlobs {
    async fn upload(
        &self,
        namespace: &str,
        key: &str,
        data: Bytes,
        options: &UploadOptions,
    ) -> Result<StoredObject, ObjectStoreError> {
        self.log.push(format!("upload {namespace}/{key}"));

        let gated = self.gated.lock().unwrap().contains(namespace);
        if gated {
            self.gate.notified().await;
        }

        let fault = self.faults.lock().unwrap().get(namespace).copied();
        match fault {
            Some(Fault::Reject) => {
                return Err(ObjectStoreError::AlreadyExists(format!("{namespace}/{key}")))
            }
            Some(Fault::Panic) => panic!("blob backend exploded"),
            Some(Fault::EmptyPath) => {
                return Ok(StoredObject {
                    path: String::new(),
                })
            }
            None => {}
        }

        let mut objects = self.objects.lock().unwrap();
        let slot = (namespace.to_string(), key.to_string());
        if !options.overwrite && objects.contains_key(&slot) {
            return Err(ObjectStoreError::AlreadyExists(format!("{namespace}/{key}")));
        }
        objects.insert(slot, (data, options.clone()));

        Ok(StoredObject {
            path: key.to_string(),
        })
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Bytes, ObjectStoreError> {
        self.objects
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), key.to_string()))
            .map(|(data, _)| data.clone())
            .ok_or_else(|| ObjectStoreError::NotFound(format!("{namespace}/{key}")))
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), ObjectStoreError> {
        self.log.push(format!("delete {namespace}/{key}"));
        self.objects
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }

    async fn exists(&self, namespace: &str, key: &str) -> Result<bool, ObjectStoreError> {
        Ok(self.contains(namespace, key))
    }
}

/// Metadata store that keeps inserted songs in a vector, optionally refusing them.
#[derive(Default)]
pub struct MemorySongs {
    pub log: CallLog,
    pub songs: Mutex<Vec<SongRecord>>,
    pub reject: Mutex<bool>,
}

impl MemorySongs {
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }
}

#[async_trait]
impl MetadataStore for MemorySongs {
    async fn insert_song(&self, song: NewSong) -> Result<SongRecord, DatabaseError> {
        self.log.push(format!("insert {}", song.title));
        if *self.reject.lock().unwrap() {
            return Err(DatabaseError::InvalidRecord(
                "duplicate key value violates unique constraint".to_string(),
            ));
        }
        let record = SongRecord::from_new(
            format!("song-row-{}", self.songs.lock().unwrap().len() + 1),
            song,
            chrono::Utc::now(),
        );
        self.songs.lock().unwrap().push(record.clone());
        Ok(record)
    }
}

/// Everything an orchestrator test needs, wired to the same call log.
pub struct Harness {
    pub log: CallLog,
    pub blobs: Arc<MemoryBlobs>,
    pub songs: Arc<MemorySongs>,
    pub notes: Arc<NotificationLog>,
    pub surface: Arc<SurfaceSignals>,
}

impl Harness {
    pub fn new() -> Self {
        let log = CallLog::default();
        Self {
            blobs: Arc::new(MemoryBlobs::with_log(log.clone())),
            songs: Arc::new(MemorySongs::with_log(log.clone())),
            notes: Arc::new(NotificationLog::default()),
            surface: Arc::new(SurfaceSignals::default()),
            log,
        }
    }

    pub fn orchestrator(
        &self,
        session: StaticSession,
        settings: UploadConfig,
    ) -> UploadOrchestrator {
        UploadOrchestrator::new(
            self.blobs.clone(),
            self.songs.clone(),
            Arc::new(session),
            self.notes.clone(),
            settings,
        )
    }

    pub fn surface(&self) -> Arc<dyn PresentationSurface> {
        self.surface.clone()
    }
}

pub fn mp3(size: usize) -> MediaFile {
    MediaFile::new("track.mp3", None, Bytes::from(vec![0xFFu8; size]))
}

pub fn png(size: usize) -> MediaFile {
    MediaFile::new(
        "cover.png",
        Some("image/png".to_string()),
        Bytes::from(vec![0x89u8; size]),
    )
}
