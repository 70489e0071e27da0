//! RAII guard for abandoned uploads
//!
//! While an upload is in flight it owns three resources: a pending catalog
//! record, a staging area, and (between promotion and commit) a permanent
//! blob. [`StagingGuard`] releases all of them if the session ends without a
//! commit, including when the owning future is simply dropped.

use pkgreg_catalog::Catalog;
use pkgreg_errors::Error;
use pkgreg_events::{AppEvent, EventEmitter, EventSender, UploadEvent};
use pkgreg_store::BlobStore;
use pkgreg_types::{BlobKey, PackageIdentity, RecordId};
use std::sync::Arc;

/// Everything an in-flight upload has reserved
pub(crate) struct StagedUpload {
    pub catalog: Arc<dyn Catalog>,
    pub store: Arc<dyn BlobStore>,
    pub events: Option<EventSender>,
    pub session_id: String,
    pub identity: PackageIdentity,
    pub record_id: RecordId,
    pub staging: BlobKey,
    pub promoted: Option<BlobKey>,
}

impl StagedUpload {
    /// Release every reserved resource, attempting all of them even if one fails
    async fn release(self) -> Result<(), Error> {
        let mut first_error = None;

        let mut note = |resource: &str, result: Result<(), Error>| {
            if let Err(err) = result {
                tracing::warn!(
                    session = %self.session_id,
                    resource,
                    error = %err,
                    "upload cleanup failed"
                );
                self.events.emit_correlated(
                    &self.session_id,
                    AppEvent::Upload(UploadEvent::CleanupFailed {
                        session_id: self.session_id.clone(),
                        resource: resource.to_string(),
                        error: err.to_string(),
                    }),
                );
                first_error.get_or_insert(err);
            }
        };

        note(
            self.staging.as_str(),
            self.store.discard(&self.staging).await,
        );
        if let Some(key) = &self.promoted {
            note(key.as_str(), self.store.delete(key).await);
        }
        note(
            "pending record",
            self.catalog.abort(&self.identity, self.record_id).await,
        );

        first_error.map_or(Ok(()), Err)
    }
}

/// Releases an upload's resources unless disarmed by a successful commit
pub struct StagingGuard {
    staged: Option<StagedUpload>,
}

impl StagingGuard {
    pub(crate) fn new(staged: StagedUpload) -> Self {
        Self {
            staged: Some(staged),
        }
    }

    /// Record that the staging area has been promoted to `key`
    pub(crate) fn promoted(&mut self, key: BlobKey) {
        if let Some(staged) = &mut self.staged {
            staged.promoted = Some(key);
        }
    }

    /// Keep everything; the upload committed
    pub(crate) fn disarm(&mut self) {
        self.staged = None;
    }

    /// Whether cleanup is still pending
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.staged.is_some()
    }

    /// Clean up now and wait for it
    ///
    /// # Errors
    ///
    /// Returns the first cleanup failure; the remaining steps still run.
    pub async fn release(&mut self) -> Result<(), Error> {
        match self.staged.take() {
            Some(staged) => staged.release().await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for StagingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingGuard")
            .field("armed", &self.is_armed())
            .finish()
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if let Some(staged) = self.staged.take() {
            // Best effort cleanup on the runtime that owned the upload
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        let _ = staged.release().await;
                    });
                }
                Err(_) => tracing::warn!(
                    session = %staged.session_id,
                    staging = %staged.staging,
                    "upload dropped outside a runtime; leaving it for the sweeper"
                ),
            }
        }
    }
}
