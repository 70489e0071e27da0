//! Filesystem blob store
//!
//! Layout under the root directory:
//! - `staging/<upload id>`: in-flight uploads, appended to in place
//! - `packages/<org>/<type>/<name>/<version>/<upload id>`: committed blobs
//!
//! Blobs become visible through a single `rename`, so a reader either sees
//! the full file or nothing.

use async_trait::async_trait;
use bytes::Bytes;
use pkgreg_errors::{Error, StorageError};
use pkgreg_types::BlobKey;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::BlobStore;

/// Blob store rooted at a local directory
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root and staging directories
    ///
    /// # Errors
    /// Returns an error if directory creation fails
    pub async fn initialize(&self) -> Result<(), Error> {
        let staging = self.root.join("staging");
        fs::create_dir_all(&staging)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, &staging))?;
        Ok(())
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to a path, refusing anything that could escape the root
    ///
    /// # Errors
    /// Returns `StorageError::InvalidKey` for absolute keys, empty segments,
    /// backslashes, or `.`/`..` components.
    pub fn path_for(&self, key: &BlobKey) -> Result<PathBuf, Error> {
        let raw = key.as_str();
        let invalid = || StorageError::InvalidKey {
            key: raw.to_string(),
        };

        if raw.is_empty()
            || raw.contains('\\')
            || raw
                .split('/')
                .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(invalid().into());
        }
        let relative = Path::new(raw);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(invalid().into());
        }
        Ok(self.root.join(relative))
    }

    async fn ensure_parent(path: &Path) -> Result<(), Error> {
        let parent = path.parent().ok_or_else(|| StorageError::IoError {
            message: "failed to get parent directory".to_string(),
        })?;
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, parent))?;
        Ok(())
    }

    async fn remove_if_present(path: &Path) -> Result<bool, Error> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::from_io_with_path(&e, path).into()),
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &BlobKey, data: Bytes) -> Result<(), Error> {
        let dest_path = self.path_for(key)?;
        Self::ensure_parent(&dest_path).await?;

        // Write next to the destination so the rename stays on one filesystem
        let temp_path = dest_path.with_file_name(format!("{}.tmp", Uuid::new_v4()));
        if let Err(e) = fs::write(&temp_path, &data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::from_io_with_path(&e, &temp_path).into());
        }

        if let Err(e) = fs::rename(&temp_path, &dest_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::AtomicRenameFailed {
                message: format!("failed to move temp file into place: {e}"),
            }
            .into());
        }
        Ok(())
    }

    async fn get(&self, key: &BlobKey) -> Result<Bytes, Error> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::BlobNotFound {
                key: key.to_string(),
            }
            .into()),
            Err(e) => Err(StorageError::from_io_with_path(&e, &path).into()),
        }
    }

    async fn delete(&self, key: &BlobKey) -> Result<(), Error> {
        let path = self.path_for(key)?;
        if Self::remove_if_present(&path).await? {
            tracing::debug!(key = %key, "blob removed");
        }
        Ok(())
    }

    async fn open_staging(&self, staging: &BlobKey) -> Result<(), Error> {
        let path = self.path_for(staging)?;
        Self::ensure_parent(&path).await?;
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, &path))?;
        Ok(())
    }

    async fn append(&self, staging: &BlobKey, chunk: &[u8]) -> Result<(), Error> {
        let path = self.path_for(staging)?;
        let mut file = match fs::OpenOptions::new().append(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::StagingNotFound {
                    key: staging.to_string(),
                }
                .into())
            }
            Err(e) => return Err(StorageError::from_io_with_path(&e, &path).into()),
        };
        file.write_all(chunk)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, &path))?;
        file.flush()
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, &path))?;
        Ok(())
    }

    async fn finalize(&self, staging: &BlobKey, key: &BlobKey) -> Result<u64, Error> {
        let staging_path = self.path_for(staging)?;
        let dest_path = self.path_for(key)?;

        let size = match fs::metadata(&staging_path).await {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::StagingNotFound {
                    key: staging.to_string(),
                }
                .into())
            }
            Err(e) => return Err(StorageError::from_io_with_path(&e, &staging_path).into()),
        };

        Self::ensure_parent(&dest_path).await?;
        fs::rename(&staging_path, &dest_path)
            .await
            .map_err(|e| StorageError::AtomicRenameFailed {
                message: format!("{staging} -> {key}: {e}"),
            })?;

        tracing::debug!(staging = %staging, key = %key, size, "staging promoted");
        Ok(size)
    }

    async fn discard(&self, staging: &BlobKey) -> Result<(), Error> {
        let path = self.path_for(staging)?;
        Self::remove_if_present(&path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_path_for_rejects_escapes() {
        let store = FsBlobStore::new("/srv/blobs");
        for key in ["", "/etc/passwd", "a/../b", "a//b", "./a", "a/./b", "a\\b", "a/"] {
            assert!(store.path_for(&BlobKey::new(key)).is_err(), "{key:?}");
        }
        assert_eq!(
            store.path_for(&BlobKey::new("staging/abc")).unwrap(),
            PathBuf::from("/srv/blobs/staging/abc")
        );
    }

    #[tokio::test]
    async fn test_staging_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        store.initialize().await.unwrap();

        let staging = BlobKey::staging(&Uuid::new_v4());
        let key = BlobKey::new("packages/acme/archive/tool/1.0/x");

        store.open_staging(&staging).await.unwrap();
        store.append(&staging, b"hello ").await.unwrap();
        store.append(&staging, b"world").await.unwrap();

        // Not readable until promoted
        assert!(store.get(&key).await.is_err());

        let size = store.finalize(&staging, &key).await.unwrap();
        assert_eq!(size, 11);
        assert_eq!(store.get(&key).await.unwrap(), Bytes::from_static(b"hello world"));
        assert!(!store.path_for(&staging).unwrap().exists());
    }

    #[tokio::test]
    async fn test_append_to_missing_staging() {
        let dir = tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        let err = store
            .append(&BlobKey::staging(&Uuid::new_v4()), b"x")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::StagingNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_and_discard_are_idempotent() {
        let dir = tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        let key = BlobKey::new("packages/a/b");

        store.put(&key, Bytes::from_static(b"data")).await.unwrap();
        store.delete(&key).await.unwrap();
        store.delete(&key).await.unwrap();
        store
            .discard(&BlobKey::staging(&Uuid::new_v4()))
            .await
            .unwrap();
    }
}
