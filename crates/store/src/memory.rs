//! In-memory blob store

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use pkgreg_errors::{Error, StorageError};
use pkgreg_types::BlobKey;
use std::sync::Arc;

use crate::BlobStore;

/// Blob store backed by concurrent maps. Clones share contents.
#[derive(Clone, Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<DashMap<BlobKey, Bytes>>,
    staging: Arc<DashMap<BlobKey, BytesMut>>,
}

impl MemoryBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed blobs
    #[must_use]
    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }

    /// Number of open staging areas
    #[must_use]
    pub fn staging_count(&self) -> usize {
        self.staging.len()
    }

    #[must_use]
    pub fn contains(&self, key: &BlobKey) -> bool {
        self.blobs.contains_key(key)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &BlobKey, data: Bytes) -> Result<(), Error> {
        self.blobs.insert(key.clone(), data);
        Ok(())
    }

    async fn get(&self, key: &BlobKey) -> Result<Bytes, Error> {
        self.blobs
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                StorageError::BlobNotFound {
                    key: key.to_string(),
                }
                .into()
            })
    }

    async fn delete(&self, key: &BlobKey) -> Result<(), Error> {
        self.blobs.remove(key);
        Ok(())
    }

    async fn open_staging(&self, staging: &BlobKey) -> Result<(), Error> {
        if self.staging.contains_key(staging) {
            return Err(StorageError::AlreadyExists {
                path: staging.to_string(),
            }
            .into());
        }
        self.staging.insert(staging.clone(), BytesMut::new());
        Ok(())
    }

    async fn append(&self, staging: &BlobKey, chunk: &[u8]) -> Result<(), Error> {
        let mut area = self
            .staging
            .get_mut(staging)
            .ok_or_else(|| StorageError::StagingNotFound {
                key: staging.to_string(),
            })?;
        area.extend_from_slice(chunk);
        Ok(())
    }

    async fn finalize(&self, staging: &BlobKey, key: &BlobKey) -> Result<u64, Error> {
        let (_, area) = self
            .staging
            .remove(staging)
            .ok_or_else(|| StorageError::StagingNotFound {
                key: staging.to_string(),
            })?;
        let size = area.len() as u64;
        self.blobs.insert(key.clone(), area.freeze());
        Ok(size)
    }

    async fn discard(&self, staging: &BlobKey) -> Result<(), Error> {
        self.staging.remove(staging);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_finalize_moves_staging() {
        let store = MemoryBlobStore::new();
        let staging = BlobKey::staging(&Uuid::new_v4());
        let key = BlobKey::new("packages/k");

        store.open_staging(&staging).await.unwrap();
        store.append(&staging, b"ab").await.unwrap();
        store.append(&staging, b"cd").await.unwrap();
        assert_eq!(store.staging_count(), 1);

        assert_eq!(store.finalize(&staging, &key).await.unwrap(), 4);
        assert_eq!(store.staging_count(), 0);
        assert_eq!(store.get(&key).await.unwrap(), Bytes::from_static(b"abcd"));

        // Finalizing twice has nothing left to promote
        assert!(store.finalize(&staging, &key).await.is_err());
    }

    #[tokio::test]
    async fn test_discard_drops_bytes() {
        let store = MemoryBlobStore::new();
        let staging = BlobKey::staging(&Uuid::new_v4());
        store.open_staging(&staging).await.unwrap();
        store.append(&staging, b"partial").await.unwrap();
        store.discard(&staging).await.unwrap();
        assert_eq!(store.staging_count(), 0);
        assert!(store.append(&staging, b"late").await.is_err());
    }
}
