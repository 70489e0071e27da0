#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Blob storage for pkgreg
//!
//! Package bytes live behind the [`BlobStore`] trait. An upload writes into a
//! staging area chunk by chunk and is promoted to its permanent key in one
//! step once it has been verified. Readers only ever see promoted blobs.
//!
//! Two implementations ship here: [`FsBlobStore`] for a local directory and
//! [`MemoryBlobStore`] for tests and ephemeral registries. Download URLs are
//! issued by a [`UrlIssuer`].

mod fs;
mod memory;
pub mod url;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;
pub use url::{SignedUrlIssuer, UrlIssuer};

use async_trait::async_trait;
use bytes::Bytes;
use pkgreg_errors::Error;
use pkgreg_types::BlobKey;

/// Storage backend for package contents
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Store a complete blob under `key`, replacing nothing partially
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the write fails.
    async fn put(&self, key: &BlobKey, data: Bytes) -> Result<(), Error>;

    /// Read a complete blob
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BlobNotFound` if nothing is stored under `key`.
    async fn get(&self, key: &BlobKey) -> Result<Bytes, Error>;

    /// Remove a blob. Removing an absent blob succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to remove an existing blob.
    async fn delete(&self, key: &BlobKey) -> Result<(), Error>;

    /// Create an empty staging area
    ///
    /// # Errors
    ///
    /// Returns an error if the staging area cannot be created.
    async fn open_staging(&self, staging: &BlobKey) -> Result<(), Error>;

    /// Append a chunk to a staging area in call order
    ///
    /// # Errors
    ///
    /// Returns `StorageError::StagingNotFound` if the area does not exist.
    async fn append(&self, staging: &BlobKey, chunk: &[u8]) -> Result<(), Error>;

    /// Promote a staging area to its permanent key, returning the blob size
    ///
    /// # Errors
    ///
    /// Returns an error if the staging area is missing or the promotion fails.
    async fn finalize(&self, staging: &BlobKey, key: &BlobKey) -> Result<u64, Error>;

    /// Drop a staging area. Discarding an absent area succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to remove an existing area.
    async fn discard(&self, staging: &BlobKey) -> Result<(), Error>;
}
