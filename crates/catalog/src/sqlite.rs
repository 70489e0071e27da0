//! `SQLite` catalog

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use pkgreg_errors::{Error, PackageError};
use pkgreg_types::{BlobKey, ListFilter, PackageIdentity, PackageRecord, PackageStatus, RecordId};
use sqlx::{Pool, Sqlite};

use crate::{check_declared, queries, Catalog, CommitOutcome, CommitRequest, DeleteResult};

/// Catalog persisted in a `SQLite` database
///
/// Each mutation runs in its own transaction. The unique index on
/// `(identity, status)` admits at most one pending upload per identity.
#[derive(Clone, Debug)]
pub struct SqliteCatalog {
    pool: Pool<Sqlite>,
    allow_overwrite: bool,
}

impl SqliteCatalog {
    /// Wrap a pool whose migrations have already run
    #[must_use]
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self {
            pool,
            allow_overwrite: false,
        }
    }

    /// Replace committed records on re-upload instead of rejecting
    #[must_use]
    pub fn with_overwrite(mut self, allow_overwrite: bool) -> Self {
        self.allow_overwrite = allow_overwrite;
        self
    }

    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn delete_one(&self, identity: &PackageIdentity) -> Result<PackageRecord, Error> {
        let mut tx = self.pool.begin().await?;
        let record = queries::find_record(&mut tx, identity, PackageStatus::Committed)
            .await?
            .ok_or_else(|| PackageError::NotFound {
                identity: identity.to_string(),
            })?;
        queries::delete_record(&mut tx, record.id).await?;
        tx.commit().await?;
        Ok(record)
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn create_pending(
        &self,
        identity: &PackageIdentity,
        staging: &BlobKey,
    ) -> Result<RecordId, Error> {
        identity.validate_for_upload()?;
        let record = PackageRecord::pending(identity.clone(), staging.clone());

        let mut tx = self.pool.begin().await?;
        if !self.allow_overwrite
            && queries::find_record(&mut tx, identity, PackageStatus::Committed)
                .await?
                .is_some()
        {
            return Err(PackageError::AlreadyExists {
                identity: identity.to_string(),
            }
            .into());
        }
        if !queries::insert_pending(&mut tx, &record).await? {
            return Err(PackageError::Conflict {
                identity: identity.to_string(),
            }
            .into());
        }
        tx.commit().await?;

        tracing::debug!(identity = %identity, record_id = %record.id, "pending record created");
        Ok(record.id)
    }

    async fn commit(
        &self,
        identity: &PackageIdentity,
        request: CommitRequest,
    ) -> Result<CommitOutcome, Error> {
        let mut tx = self.pool.begin().await?;

        let pending = queries::find_record(&mut tx, identity, PackageStatus::Pending)
            .await?
            .filter(|record| record.id == request.record_id)
            .ok_or_else(|| PackageError::NotFound {
                identity: identity.to_string(),
            })?;
        check_declared(identity, &request)?;

        let superseded = queries::find_record(&mut tx, identity, PackageStatus::Committed).await?;
        if let Some(old) = &superseded {
            if !self.allow_overwrite {
                return Err(PackageError::AlreadyExists {
                    identity: identity.to_string(),
                }
                .into());
            }
            queries::delete_record(&mut tx, old.id).await?;
        }

        let created_at = Utc::now();
        queries::promote(
            &mut tx,
            pending.id,
            request.size,
            &request.checksum,
            &request.location,
            created_at,
        )
        .await?;
        tx.commit().await?;

        let record = PackageRecord {
            id: pending.id,
            identity: pending.identity,
            size: request.size,
            checksum: Some(request.checksum),
            created_at,
            location: request.location,
            status: PackageStatus::Committed,
        };
        Ok(CommitOutcome { record, superseded })
    }

    async fn abort(&self, identity: &PackageIdentity, record_id: RecordId) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        if queries::delete_pending(&mut tx, record_id).await? {
            tracing::debug!(identity = %identity, record_id = %record_id, "pending record removed");
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, identity: &PackageIdentity) -> Result<PackageRecord, Error> {
        let mut tx = self.pool.begin().await?;
        let found = if identity.is_latest_alias() {
            queries::latest_committed(&mut tx, identity).await?
        } else {
            queries::find_record(&mut tx, identity, PackageStatus::Committed).await?
        };
        tx.commit().await?;

        found.ok_or_else(|| {
            PackageError::NotFound {
                identity: identity.to_string(),
            }
            .into()
        })
    }

    fn list(&self, filter: ListFilter) -> BoxStream<'_, Result<PackageRecord, Error>> {
        sqlx::query(queries::LIST_COMMITTED)
            .bind(filter.organization_id)
            .bind(filter.name)
            .bind(filter.version)
            .bind(filter.package_type.map(|t| t.as_str()))
            .fetch(&self.pool)
            .map(|row| {
                row.map_err(Error::from)
                    .and_then(|row| queries::row_to_record(&row))
            })
            .boxed()
    }

    async fn delete(&self, identities: &[PackageIdentity]) -> Vec<DeleteResult> {
        let mut results = Vec::with_capacity(identities.len());
        for identity in identities {
            let outcome = self.delete_one(identity).await;
            results.push((identity.clone(), outcome));
        }
        results
    }

    async fn sweep_pending(&self, older_than: DateTime<Utc>) -> Result<Vec<PackageRecord>, Error> {
        let mut tx = self.pool.begin().await?;
        let stale = queries::stale_pending(&mut tx, older_than).await?;
        for record in &stale {
            queries::delete_pending(&mut tx, record.id).await?;
        }
        tx.commit().await?;
        Ok(stale)
    }
}
