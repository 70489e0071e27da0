//! The create-package state machine
//!
//! A session is opened by the info message, fed contents chunks, and then
//! either finished (verify, promote, commit) or aborted. Every failure path
//! funnels through [`UploadSession::fail`], so a session that does not commit
//! never leaves a staging area, a promoted blob or a pending record behind.

use crate::guard::{StagedUpload, StagingGuard};
use crate::retry::RetryPolicy;
use pkgreg_catalog::{Catalog, CommitOutcome, CommitRequest};
use pkgreg_config::UploadConfig;
use pkgreg_errors::{Error, PackageError, StorageError};
use pkgreg_events::{AppEvent, EventEmitter, EventSender, FailureContext, UploadEvent};
use pkgreg_hash::ChecksumVerifier;
use pkgreg_store::BlobStore;
use pkgreg_types::{
    BlobKey, Checksum, ChecksumAlgorithm, CreatePackageRequest, PackageIdentity, PackageInfo,
    RecordId,
};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Size limits enforced while receiving contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_chunk_size: u64,
    pub max_package_size: u64,
}

impl From<&UploadConfig> for UploadLimits {
    fn from(config: &UploadConfig) -> Self {
        Self {
            max_chunk_size: config.max_chunk_size,
            max_package_size: config.max_package_size,
        }
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

/// Shared collaborators of every upload session
#[derive(Clone)]
pub struct UploadContext {
    pub catalog: Arc<dyn Catalog>,
    pub store: Arc<dyn BlobStore>,
    pub limits: UploadLimits,
    pub retry: RetryPolicy,
    pub events: Option<EventSender>,
}

impl UploadContext {
    #[must_use]
    pub fn new(catalog: Arc<dyn Catalog>, store: Arc<dyn BlobStore>) -> Self {
        Self {
            catalog,
            store,
            limits: UploadLimits::default(),
            retry: RetryPolicy::default(),
            events: None,
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: UploadLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }
}

impl fmt::Debug for UploadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadContext")
            .field("limits", &self.limits)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Lifecycle state of an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    /// Pending record and staging area reserved, no contents yet
    Opened,
    Receiving,
    /// Digest verified, promoting and committing
    Committing,
    Committed,
    Aborted,
}

impl UploadState {
    /// Whether `self -> next` is a legal transition
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use UploadState::{Aborted, Committed, Committing, Opened, Receiving};
        matches!(
            (self, next),
            (Opened | Receiving, Receiving | Committing | Aborted) | (Committing, Committed | Aborted)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Aborted)
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Opened => "opened",
            Self::Receiving => "receiving",
            Self::Committing => "committing",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// One in-flight create-package upload
#[derive(Debug)]
pub struct UploadSession {
    session_id: Uuid,
    identity: PackageIdentity,
    declared: Option<Checksum>,
    record_id: RecordId,
    staging: BlobKey,
    verifier: Option<ChecksumVerifier>,
    received: u64,
    state: UploadState,
    guard: StagingGuard,
    ctx: UploadContext,
}

impl UploadSession {
    /// Validate `info`, reserve a pending record and open a staging area
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdentity` for a malformed identity, `AlreadyExists` or
    /// `Conflict` if the identity is taken, or a storage failure.
    pub async fn open(info: PackageInfo, ctx: UploadContext) -> Result<Self, Error> {
        let PackageInfo { identity, checksum } = info;
        identity.validate_for_upload()?;

        let session_id = Uuid::new_v4();
        let staging = BlobKey::staging(&session_id);
        let correlation = session_id.to_string();

        let record_id = ctx
            .retry
            .run("catalog.create_pending", &ctx.events, || {
                ctx.catalog.create_pending(&identity, &staging)
            })
            .await?;

        let mut guard = StagingGuard::new(StagedUpload {
            catalog: Arc::clone(&ctx.catalog),
            store: Arc::clone(&ctx.store),
            events: ctx.events.clone(),
            session_id: correlation.clone(),
            identity: identity.clone(),
            record_id,
            staging: staging.clone(),
            promoted: None,
        });

        if let Err(err) = ctx.store.open_staging(&staging).await {
            let _ = guard.release().await;
            return Err(err);
        }

        tracing::info!(
            session = %correlation,
            identity = %identity,
            staging = %staging,
            "upload started"
        );
        ctx.events.emit_correlated(
            &correlation,
            AppEvent::Upload(UploadEvent::Started {
                session_id: correlation.clone(),
                identity: identity.to_string(),
                staging: staging.to_string(),
            }),
        );

        let algorithm = checksum
            .as_ref()
            .map_or(ChecksumAlgorithm::Blake3, Checksum::algorithm);

        Ok(Self {
            session_id,
            identity,
            declared: checksum,
            record_id,
            staging,
            verifier: Some(ChecksumVerifier::new(algorithm)),
            received: 0,
            state: UploadState::Opened,
            guard,
            ctx,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    #[must_use]
    pub fn identity(&self) -> &PackageIdentity {
        &self.identity
    }

    #[must_use]
    pub fn state(&self) -> UploadState {
        self.state
    }

    /// Bytes appended so far
    #[must_use]
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Handle a stream message after the opening info message
    ///
    /// # Errors
    ///
    /// A second info message is `InvalidIdentity`; contents errors are those
    /// of [`UploadSession::receive`]. The session is aborted on error.
    pub async fn handle(&mut self, message: CreatePackageRequest) -> Result<(), Error> {
        match message {
            CreatePackageRequest::Contents(bytes) => self.receive(&bytes).await,
            CreatePackageRequest::Info(_) => {
                let err = PackageError::InvalidIdentity {
                    identity: self.identity.to_string(),
                    reason: "package info sent more than once".to_string(),
                }
                .into();
                Err(self.fail(err).await)
            }
        }
    }

    /// Append one contents chunk
    ///
    /// # Errors
    ///
    /// Returns `PayloadTooLarge` when a chunk or the running total exceeds
    /// its limit, or a storage failure. The session is aborted on error.
    pub async fn receive(&mut self, chunk: &[u8]) -> Result<(), Error> {
        match self.try_receive(chunk).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err).await),
        }
    }

    async fn try_receive(&mut self, chunk: &[u8]) -> Result<(), Error> {
        self.transition(UploadState::Receiving)?;

        let size = chunk.len() as u64;
        let limits = self.ctx.limits;
        if size > limits.max_chunk_size {
            return Err(PackageError::ChunkTooLarge {
                identity: self.identity.to_string(),
                limit: limits.max_chunk_size,
                size,
            }
            .into());
        }
        let total = self.received.saturating_add(size);
        if total > limits.max_package_size {
            return Err(PackageError::PayloadTooLarge {
                identity: self.identity.to_string(),
                limit: limits.max_package_size,
                size: total,
            }
            .into());
        }

        self.ctx.store.append(&self.staging, chunk).await?;
        if let Some(verifier) = &mut self.verifier {
            verifier.update(chunk);
        }
        self.received = total;

        let correlation = self.session_id.to_string();
        self.ctx.events.emit_correlated(
            &correlation,
            AppEvent::Upload(UploadEvent::ChunkReceived {
                session_id: correlation.clone(),
                bytes: size,
                total,
            }),
        );
        Ok(())
    }

    /// Verify, promote and commit the upload
    ///
    /// # Errors
    ///
    /// Returns `ChecksumMismatch` if the digest differs from the declared one,
    /// `AlreadyExists` if another upload committed first, or a storage
    /// failure. Nothing becomes visible on error.
    pub async fn finish(mut self) -> Result<CommitOutcome, Error> {
        match self.try_finish().await {
            Ok(outcome) => Ok(outcome),
            Err(err) => Err(self.fail(err).await),
        }
    }

    async fn try_finish(&mut self) -> Result<CommitOutcome, Error> {
        self.transition(UploadState::Committing)?;

        let checksum = self
            .verifier
            .take()
            .ok_or_else(|| Error::internal("upload digest already finalized"))?
            .finalize();
        if let Some(declared) = &self.declared {
            if *declared != checksum {
                return Err(PackageError::ChecksumMismatch {
                    identity: self.identity.to_string(),
                    expected: declared.to_string(),
                    actual: checksum.to_string(),
                }
                .into());
            }
        }

        let correlation = self.session_id.to_string();
        self.ctx.events.emit_correlated(
            &correlation,
            AppEvent::Upload(UploadEvent::Verified {
                session_id: correlation.clone(),
                checksum: checksum.to_string(),
                declared: self.declared.is_some(),
            }),
        );

        let ctx = &self.ctx;
        let staging = &self.staging;
        let key = BlobKey::for_package(&self.identity, &self.session_id);
        let location = &key;

        let size = ctx
            .retry
            .run("store.finalize", &ctx.events, || {
                ctx.store.finalize(staging, location)
            })
            .await?;
        self.guard.promoted(key.clone());
        if size != self.received {
            return Err(StorageError::CorruptedData {
                message: format!(
                    "promoted blob {key} holds {size} bytes, expected {}",
                    self.received
                ),
            }
            .into());
        }

        let identity = &self.identity;
        let request = CommitRequest {
            record_id: self.record_id,
            location: key.clone(),
            checksum: checksum.clone(),
            size,
            declared: self.declared.clone(),
        };
        let outcome = ctx
            .retry
            .run("catalog.commit", &ctx.events, || {
                ctx.catalog.commit(identity, request.clone())
            })
            .await?;

        self.guard.disarm();
        self.transition(UploadState::Committed)?;

        tracing::info!(
            session = %correlation,
            identity = %self.identity,
            size,
            checksum = %checksum,
            superseded = outcome.superseded.is_some(),
            "upload committed"
        );
        self.ctx.events.emit_correlated(
            &correlation,
            AppEvent::Upload(UploadEvent::Committed {
                session_id: correlation.clone(),
                identity: self.identity.to_string(),
                size,
                checksum: checksum.to_string(),
                superseded: outcome.superseded.is_some(),
            }),
        );
        Ok(outcome)
    }

    /// Abandon the upload, releasing everything it reserved
    ///
    /// Returns `reason` so callers can propagate it.
    pub async fn abort(mut self, reason: Error) -> Error {
        self.fail(reason).await
    }

    async fn fail(&mut self, err: Error) -> Error {
        if self.state.is_terminal() {
            return err;
        }
        self.state = UploadState::Aborted;
        // Cleanup failures are reported as events by the guard
        let _ = self.guard.release().await;

        let correlation = self.session_id.to_string();
        tracing::warn!(
            session = %correlation,
            identity = %self.identity,
            kind = %err.kind(),
            error = %err,
            "upload aborted"
        );
        self.ctx.events.emit_correlated(
            &correlation,
            AppEvent::Upload(UploadEvent::Aborted {
                session_id: correlation.clone(),
                identity: Some(self.identity.to_string()),
                failure: FailureContext::from_error(&err),
            }),
        );
        err
    }

    fn transition(&mut self, next: UploadState) -> Result<(), Error> {
        if !self.state.can_transition_to(next) {
            return Err(Error::internal(format!(
                "upload {} cannot move from {} to {next}",
                self.session_id, self.state
            )));
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use UploadState::{Aborted, Committed, Committing, Opened, Receiving};

        assert!(Opened.can_transition_to(Receiving));
        assert!(Opened.can_transition_to(Committing));
        assert!(Receiving.can_transition_to(Receiving));
        assert!(Committing.can_transition_to(Committed));
        assert!(Committing.can_transition_to(Aborted));

        assert!(!Opened.can_transition_to(Committed));
        assert!(!Committing.can_transition_to(Receiving));
        assert!(!Committed.can_transition_to(Aborted));
        assert!(!Aborted.can_transition_to(Receiving));
    }

    #[test]
    fn test_limits_from_config() {
        let config = UploadConfig {
            max_chunk_size: 16,
            max_package_size: 64,
            ..UploadConfig::default()
        };
        let limits = UploadLimits::from(&config);
        assert_eq!(limits.max_chunk_size, 16);
        assert_eq!(limits.max_package_size, 64);
    }
}
