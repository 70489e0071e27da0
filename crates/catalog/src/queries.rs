//! Runtime SQL queries for catalog operations

use chrono::{DateTime, Utc};
use pkgreg_errors::{CatalogError, Error};
use pkgreg_types::{
    BlobKey, Checksum, PackageIdentity, PackageRecord, PackageStatus, PackageType, RecordId,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{query, Row, Sqlite, Transaction};

const RECORD_COLUMNS: &str = "id, organization_id, name, version, package_type, status, size, \
                              checksum, location, created_at";

/// Committed records of one organization with optional equality filters
pub const LIST_COMMITTED: &str = "SELECT id, organization_id, name, version, package_type, status, \
     size, checksum, location, created_at
     FROM packages
     WHERE organization_id = ?1 AND status = 'committed'
       AND (?2 IS NULL OR name = ?2)
       AND (?3 IS NULL OR version = ?3)
       AND (?4 IS NULL OR package_type = ?4)
     ORDER BY name, version, package_type";

fn corrupted(message: impl Into<String>) -> Error {
    CatalogError::Corrupted {
        message: message.into(),
    }
    .into()
}

/// Decode one `packages` row
///
/// # Errors
///
/// Returns `CatalogError::Corrupted` if a column holds an unparseable value.
pub fn row_to_record(row: &SqliteRow) -> Result<PackageRecord, Error> {
    let id: String = row.try_get("id")?;
    let package_type: String = row.try_get("package_type")?;
    let status: String = row.try_get("status")?;
    let size: i64 = row.try_get("size")?;
    let checksum: Option<String> = row.try_get("checksum")?;
    let location: String = row.try_get("location")?;
    let created_at: i64 = row.try_get("created_at")?;

    let id = RecordId::parse_str(&id).map_err(|e| corrupted(format!("invalid record id: {e}")))?;
    let package_type: PackageType = package_type
        .parse()
        .map_err(|e| corrupted(format!("record {id}: {e}")))?;
    let status: PackageStatus = status
        .parse()
        .map_err(|e: String| corrupted(format!("record {id}: {e}")))?;
    let size = u64::try_from(size).map_err(|_| corrupted(format!("record {id}: negative size")))?;
    let checksum = checksum
        .map(|value| value.parse::<Checksum>())
        .transpose()
        .map_err(|e| corrupted(format!("record {id}: {e}")))?;
    let created_at = DateTime::<Utc>::from_timestamp_micros(created_at)
        .ok_or_else(|| corrupted(format!("record {id}: timestamp out of range")))?;

    Ok(PackageRecord {
        id,
        identity: PackageIdentity {
            organization_id: row.try_get("organization_id")?,
            name: row.try_get("name")?,
            version: row.try_get("version")?,
            package_type,
        },
        size,
        checksum,
        created_at,
        location: BlobKey::new(location),
        status,
    })
}

/// Find the record of `identity` in `status`
pub async fn find_record(
    tx: &mut Transaction<'_, Sqlite>,
    identity: &PackageIdentity,
    status: PackageStatus,
) -> Result<Option<PackageRecord>, Error> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM packages
         WHERE organization_id = ?1 AND name = ?2 AND version = ?3
           AND package_type = ?4 AND status = ?5"
    );
    let row = query(&sql)
        .bind(&identity.organization_id)
        .bind(&identity.name)
        .bind(&identity.version)
        .bind(identity.package_type.as_str())
        .bind(status.as_str())
        .fetch_optional(&mut **tx)
        .await?;

    row.as_ref().map(row_to_record).transpose()
}

/// Newest committed version of `(organization, name, type)`
pub async fn latest_committed(
    tx: &mut Transaction<'_, Sqlite>,
    identity: &PackageIdentity,
) -> Result<Option<PackageRecord>, Error> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM packages
         WHERE organization_id = ?1 AND name = ?2 AND package_type = ?3
           AND status = 'committed'
         ORDER BY created_at DESC, version DESC
         LIMIT 1"
    );
    let row = query(&sql)
        .bind(&identity.organization_id)
        .bind(&identity.name)
        .bind(identity.package_type.as_str())
        .fetch_optional(&mut **tx)
        .await?;

    row.as_ref().map(row_to_record).transpose()
}

/// Insert a pending record
///
/// Returns `false` if the identity already has a pending record.
pub async fn insert_pending(
    tx: &mut Transaction<'_, Sqlite>,
    record: &PackageRecord,
) -> Result<bool, Error> {
    let result = query(
        "INSERT INTO packages
         (id, organization_id, name, version, package_type, status, size, checksum, location, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'pending', 0, NULL, ?6, ?7)",
    )
    .bind(record.id.to_string())
    .bind(&record.identity.organization_id)
    .bind(&record.identity.name)
    .bind(&record.identity.version)
    .bind(record.identity.package_type.as_str())
    .bind(record.location.as_str())
    .bind(record.created_at.timestamp_micros())
    .execute(&mut **tx)
    .await;

    match result {
        Ok(_) => Ok(true),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Turn a pending row into a committed one
pub async fn promote(
    tx: &mut Transaction<'_, Sqlite>,
    id: RecordId,
    size: u64,
    checksum: &Checksum,
    location: &BlobKey,
    created_at: DateTime<Utc>,
) -> Result<(), Error> {
    let size = i64::try_from(size).map_err(|_| CatalogError::InvalidTransition {
        from: "pending".to_string(),
        to: format!("committed with size {size}"),
    })?;
    let result = query(
        "UPDATE packages
         SET status = 'committed', size = ?2, checksum = ?3, location = ?4, created_at = ?5
         WHERE id = ?1 AND status = 'pending'",
    )
    .bind(id.to_string())
    .bind(size)
    .bind(checksum.to_string())
    .bind(location.as_str())
    .bind(created_at.timestamp_micros())
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 1 {
        Ok(())
    } else {
        Err(CatalogError::InvalidTransition {
            from: "missing".to_string(),
            to: "committed".to_string(),
        }
        .into())
    }
}

/// Delete a record by id, returning whether a row was removed
pub async fn delete_record(tx: &mut Transaction<'_, Sqlite>, id: RecordId) -> Result<bool, Error> {
    let result = query("DELETE FROM packages WHERE id = ?1")
        .bind(id.to_string())
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete a pending record only if it still belongs to `id`
pub async fn delete_pending(tx: &mut Transaction<'_, Sqlite>, id: RecordId) -> Result<bool, Error> {
    let result = query("DELETE FROM packages WHERE id = ?1 AND status = 'pending'")
        .bind(id.to_string())
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Pending records created before `cutoff`
pub async fn stale_pending(
    tx: &mut Transaction<'_, Sqlite>,
    cutoff: DateTime<Utc>,
) -> Result<Vec<PackageRecord>, Error> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM packages
         WHERE status = 'pending' AND created_at < ?1
         ORDER BY created_at"
    );
    let rows = query(&sql)
        .bind(cutoff.timestamp_micros())
        .fetch_all(&mut **tx)
        .await?;

    rows.iter().map(row_to_record).collect()
}
