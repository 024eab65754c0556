use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::{validate_key, ObjectStore, ObjectStoreError, StoredObject, UploadOptions};

/// Local filesystem object store for development and testing.
/// Each namespace is a directory under the base path. Cache directives are not persisted.
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    fn object_path(&self, namespace: &str, key: &str) -> Result<PathBuf, ObjectStoreError> {
        validate_key(namespace)?;
        validate_key(key)?;
        Ok(self.base_path.join(namespace).join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn upload(
        &self,
        namespace: &str,
        key: &str,
        data: Bytes,
        options: &UploadOptions,
    ) -> Result<StoredObject, ObjectStoreError> {
        let path = self.object_path(namespace, key)?;
        tokio::fs::create_dir_all(self.base_path.join(namespace)).await?;

        let mut open = tokio::fs::OpenOptions::new();
        open.write(true);
        if options.overwrite {
            open.create(true).truncate(true);
        } else {
            open.create_new(true);
        }

        let mut file = open.open(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => {
                ObjectStoreError::AlreadyExists(format!("{namespace}/{key}"))
            }
            _ => ObjectStoreError::Io(e),
        })?;

        if let Err(e) = write_all(&mut file, &data).await {
            drop(file);
            // Don't leave a truncated object behind under a key nobody will reference
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e.into());
        }

        Ok(StoredObject {
            path: key.to_string(),
        })
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Bytes, ObjectStoreError> {
        let path = self.object_path(namespace, key)?;
        if !path.exists() {
            return Err(ObjectStoreError::NotFound(format!("{namespace}/{key}")));
        }
        let data = tokio::fs::read(&path).await?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.object_path(namespace, key)?;
        if path.exists() {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }

    async fn exists(&self, namespace: &str, key: &str) -> Result<bool, ObjectStoreError> {
        let path = self.object_path(namespace, key)?;
        Ok(path.exists())
    }
}

async fn write_all(file: &mut tokio::fs::File, data: &[u8]) -> std::io::Result<()> {
    file.write_all(data).await?;
    file.flush().await
}
