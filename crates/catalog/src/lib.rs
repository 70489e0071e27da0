#![deny(clippy::pedantic, unsafe_code)]
#![allow(
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::missing_panics_doc
)]
#![allow(clippy::module_name_repetitions)]

//! Package catalog for pkgreg
//!
//! The catalog is the single source of truth for which packages exist. A
//! record starts `pending` when an upload opens and becomes `committed` only
//! once its bytes are verified and promoted; readers never see pending
//! records. Two backends implement [`Catalog`]:
//!
//! - [`MemoryCatalog`]: a `DashMap` keyed by identity, one entry guard per
//!   mutation
//! - [`SqliteCatalog`]: a `sqlx` pool with one transaction per mutation and a
//!   unique index on `(identity, status)`

mod memory;
pub mod queries;
mod sqlite;

pub use memory::MemoryCatalog;
pub use sqlite::SqliteCatalog;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use pkgreg_errors::{CatalogError, Error, PackageError};
use pkgreg_types::{BlobKey, Checksum, ListFilter, PackageIdentity, PackageRecord, RecordId};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;

/// Data needed to turn a pending record into a committed one
#[derive(Debug, Clone)]
pub struct CommitRequest {
    /// Pending record being committed, as returned by `create_pending`
    pub record_id: RecordId,
    /// Permanent blob key
    pub location: BlobKey,
    /// Digest computed over the received bytes
    pub checksum: Checksum,
    pub size: u64,
    /// Digest the client declared, if any
    pub declared: Option<Checksum>,
}

/// Result of a successful commit
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub record: PackageRecord,
    /// Previously committed record replaced under the overwrite policy
    pub superseded: Option<PackageRecord>,
}

/// Reject a commit whose computed digest differs from the declared one
pub(crate) fn check_declared(
    identity: &PackageIdentity,
    request: &CommitRequest,
) -> Result<(), Error> {
    match &request.declared {
        Some(declared) if *declared != request.checksum => Err(PackageError::ChecksumMismatch {
            identity: identity.to_string(),
            expected: declared.to_string(),
            actual: request.checksum.to_string(),
        }
        .into()),
        _ => Ok(()),
    }
}

/// Per-identity result of a batch delete
pub type DeleteResult = (PackageIdentity, Result<PackageRecord, Error>);

/// Metadata store for packages
#[async_trait]
pub trait Catalog: Send + Sync + 'static {
    /// Reserve `identity` for an upload staged at `staging`
    ///
    /// # Errors
    ///
    /// - `PackageError::InvalidIdentity` if the identity fails upload validation
    /// - `PackageError::AlreadyExists` if it is committed and overwrite is off
    /// - `PackageError::Conflict` if another upload already holds it
    async fn create_pending(
        &self,
        identity: &PackageIdentity,
        staging: &BlobKey,
    ) -> Result<RecordId, Error>;

    /// Make a pending record visible
    ///
    /// # Errors
    ///
    /// - `PackageError::NotFound` if the pending record is gone
    /// - `PackageError::ChecksumMismatch` if the declared digest differs
    /// - `PackageError::AlreadyExists` if a committed record appeared and
    ///   overwrite is off
    async fn commit(
        &self,
        identity: &PackageIdentity,
        request: CommitRequest,
    ) -> Result<CommitOutcome, Error>;

    /// Drop a pending record; a missing record is not an error
    ///
    /// # Errors
    ///
    /// Returns an error only if the backend fails.
    async fn abort(&self, identity: &PackageIdentity, record_id: RecordId) -> Result<(), Error>;

    /// Fetch one committed record. Version `latest` resolves to the most
    /// recently committed version of `(organization, name, type)`.
    ///
    /// # Errors
    ///
    /// Returns `PackageError::NotFound` if no committed record matches.
    async fn get(&self, identity: &PackageIdentity) -> Result<PackageRecord, Error>;

    /// Committed records matching `filter` in listing order
    ///
    /// Every call produces a fresh stream.
    fn list(&self, filter: ListFilter) -> BoxStream<'_, Result<PackageRecord, Error>>;

    /// Remove committed records; each identity succeeds or fails on its own
    async fn delete(&self, identities: &[PackageIdentity]) -> Vec<DeleteResult>;

    /// Remove pending records created before `older_than`
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    async fn sweep_pending(&self, older_than: DateTime<Utc>) -> Result<Vec<PackageRecord>, Error>;
}

/// Create a new `SQLite` connection pool
///
/// # Errors
///
/// Returns an error if the database connection fails or configuration is invalid.
pub async fn create_pool(
    db_path: &Path,
    max_connections: u32,
    busy_timeout: Duration,
) -> Result<Pool<Sqlite>, Error> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(&e, parent))?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .pragma("temp_store", "MEMORY")
        .pragma("wal_autocheckpoint", "1000")
        .busy_timeout(busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(|e| {
            Error::from(CatalogError::DatabaseError {
                message: e.to_string(),
            })
        })?;

    Ok(pool)
}

/// Run database migrations
///
/// # Errors
///
/// Returns an error if any migration fails to execute.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<(), Error> {
    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        CatalogError::MigrationFailed {
            message: e.to_string(),
        }
        .into()
    })
}
