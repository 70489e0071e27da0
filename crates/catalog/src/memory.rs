//! In-memory catalog backed by `DashMap`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::stream::{self, BoxStream, StreamExt};
use pkgreg_errors::{Error, PackageError};
use pkgreg_types::{
    listing_order, BlobKey, ListFilter, PackageIdentity, PackageRecord, PackageStatus, RecordId,
};
use std::sync::Arc;

use crate::{check_declared, Catalog, CommitOutcome, CommitRequest, DeleteResult};

#[derive(Debug, Default)]
struct Slot {
    committed: Option<PackageRecord>,
    pending: Option<PackageRecord>,
}

impl Slot {
    fn is_empty(&self) -> bool {
        self.committed.is_none() && self.pending.is_none()
    }
}

/// Catalog held entirely in memory. Clones share state.
///
/// Every mutation runs under the map's entry guard for its identity and never
/// awaits while holding it.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    entries: Arc<DashMap<PackageIdentity, Slot>>,
    allow_overwrite: bool,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace committed records on re-upload instead of rejecting
    #[must_use]
    pub fn with_overwrite(mut self, allow_overwrite: bool) -> Self {
        self.allow_overwrite = allow_overwrite;
        self
    }

    /// Number of pending records
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().pending.is_some())
            .count()
    }

    fn resolve_latest(&self, alias: &PackageIdentity) -> Option<PackageRecord> {
        self.entries
            .iter()
            .filter(|entry| {
                let key = entry.key();
                key.organization_id == alias.organization_id
                    && key.name == alias.name
                    && key.package_type == alias.package_type
            })
            .filter_map(|entry| entry.value().committed.clone())
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.identity.version.cmp(&b.identity.version))
            })
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn create_pending(
        &self,
        identity: &PackageIdentity,
        staging: &BlobKey,
    ) -> Result<RecordId, Error> {
        identity.validate_for_upload()?;
        let record = PackageRecord::pending(identity.clone(), staging.clone());
        let id = record.id;

        match self.entries.entry(identity.clone()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                if slot.committed.is_some() && !self.allow_overwrite {
                    return Err(PackageError::AlreadyExists {
                        identity: identity.to_string(),
                    }
                    .into());
                }
                if slot.pending.is_some() {
                    return Err(PackageError::Conflict {
                        identity: identity.to_string(),
                    }
                    .into());
                }
                slot.pending = Some(record);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    committed: None,
                    pending: Some(record),
                });
            }
        }
        Ok(id)
    }

    async fn commit(
        &self,
        identity: &PackageIdentity,
        request: CommitRequest,
    ) -> Result<CommitOutcome, Error> {
        let not_found = || -> Error {
            PackageError::NotFound {
                identity: identity.to_string(),
            }
            .into()
        };

        let mut slot = self.entries.get_mut(identity).ok_or_else(not_found)?;
        match &slot.pending {
            Some(pending) if pending.id == request.record_id => {}
            _ => return Err(not_found()),
        }
        check_declared(identity, &request)?;
        if slot.committed.is_some() && !self.allow_overwrite {
            return Err(PackageError::AlreadyExists {
                identity: identity.to_string(),
            }
            .into());
        }

        let Some(pending) = slot.pending.take() else {
            return Err(not_found());
        };
        let record = PackageRecord {
            id: pending.id,
            identity: pending.identity,
            size: request.size,
            checksum: Some(request.checksum),
            created_at: Utc::now(),
            location: request.location,
            status: PackageStatus::Committed,
        };
        let superseded = slot.committed.replace(record.clone());
        Ok(CommitOutcome { record, superseded })
    }

    async fn abort(&self, identity: &PackageIdentity, record_id: RecordId) -> Result<(), Error> {
        if let Some(mut slot) = self.entries.get_mut(identity) {
            if slot.pending.as_ref().is_some_and(|p| p.id == record_id) {
                slot.pending = None;
            }
        }
        self.entries.remove_if(identity, |_, slot| slot.is_empty());
        Ok(())
    }

    async fn get(&self, identity: &PackageIdentity) -> Result<PackageRecord, Error> {
        let found = if identity.is_latest_alias() {
            self.resolve_latest(identity)
        } else {
            self.entries
                .get(identity)
                .and_then(|slot| slot.committed.clone())
        };
        found.ok_or_else(|| {
            PackageError::NotFound {
                identity: identity.to_string(),
            }
            .into()
        })
    }

    fn list(&self, filter: ListFilter) -> BoxStream<'_, Result<PackageRecord, Error>> {
        let mut records: Vec<PackageRecord> = self
            .entries
            .iter()
            .filter(|entry| filter.matches(entry.key()))
            .filter_map(|entry| entry.value().committed.clone())
            .collect();
        records.sort_by(listing_order);
        stream::iter(records.into_iter().map(Ok)).boxed()
    }

    async fn delete(&self, identities: &[PackageIdentity]) -> Vec<DeleteResult> {
        let mut results = Vec::with_capacity(identities.len());
        for identity in identities {
            let removed = match self.entries.get_mut(identity) {
                Some(mut slot) => slot.committed.take(),
                None => None,
            };
            self.entries.remove_if(identity, |_, slot| slot.is_empty());

            let outcome = removed.ok_or_else(|| {
                PackageError::NotFound {
                    identity: identity.to_string(),
                }
                .into()
            });
            results.push((identity.clone(), outcome));
        }
        results
    }

    async fn sweep_pending(&self, older_than: DateTime<Utc>) -> Result<Vec<PackageRecord>, Error> {
        let mut swept = Vec::new();
        for mut entry in self.entries.iter_mut() {
            if entry
                .pending
                .as_ref()
                .is_some_and(|p| p.created_at < older_than)
            {
                if let Some(pending) = entry.pending.take() {
                    swept.push(pending);
                }
            }
        }
        self.entries.retain(|_, slot| !slot.is_empty());
        Ok(swept)
    }
}
