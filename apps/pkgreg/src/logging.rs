//! Structured logging integration for events
//!
//! Domain events arrive on the event channel wrapped in an [`EventMessage`];
//! this module turns each into a `tracing` record carrying the event's
//! metadata and fields.

use pkgreg_events::{
    AppEvent, EventMessage, GeneralEvent, PackageEvent, SweepEvent, UploadEvent,
};
use tracing::{debug, error, info, warn};

/// Log an event using the tracing infrastructure with structured fields
pub fn log_event_with_tracing(message: &EventMessage) {
    let meta = &message.meta;
    let source = meta.source.as_str();
    let event_id = &meta.event_id;
    let correlation = meta.correlation_id.as_deref();

    match &message.event {
        AppEvent::General(event) => match event {
            GeneralEvent::Warning { message, context } => {
                warn!(target: "pkgreg::events", source, %event_id, correlation, context = ?context, "{message}");
            }
            GeneralEvent::Error { message, details } => {
                error!(target: "pkgreg::events", source, %event_id, correlation, details = ?details, "{message}");
            }
            GeneralEvent::DebugLog { message, context } => {
                debug!(target: "pkgreg::events", source, %event_id, correlation, context = ?context, "{message}");
            }
            GeneralEvent::RetryScheduled {
                operation,
                attempt,
                delay_ms,
                error,
            } => {
                warn!(
                    target: "pkgreg::events",
                    source,
                    %event_id,
                    correlation,
                    operation = %operation,
                    attempt,
                    delay_ms,
                    error = %error,
                    "Retry scheduled"
                );
            }
        },

        AppEvent::Upload(event) => match event {
            UploadEvent::Started {
                session_id,
                identity,
                staging,
            } => {
                info!(target: "pkgreg::events", source, %event_id, session = %session_id, identity = %identity, staging = %staging, "Upload started");
            }
            UploadEvent::ChunkReceived {
                session_id,
                bytes,
                total,
            } => {
                debug!(target: "pkgreg::events", source, %event_id, session = %session_id, bytes, total, "Chunk received");
            }
            UploadEvent::Verified {
                session_id,
                checksum,
                declared,
            } => {
                debug!(target: "pkgreg::events", source, %event_id, session = %session_id, checksum = %checksum, declared, "Upload verified");
            }
            UploadEvent::Committed {
                session_id,
                identity,
                size,
                checksum,
                superseded,
            } => {
                info!(
                    target: "pkgreg::events",
                    source,
                    %event_id,
                    session = %session_id,
                    identity = %identity,
                    size,
                    checksum = %checksum,
                    superseded,
                    "Upload committed"
                );
            }
            UploadEvent::Aborted {
                session_id,
                identity,
                failure,
            } => {
                warn!(
                    target: "pkgreg::events",
                    source,
                    %event_id,
                    session = %session_id,
                    identity = ?identity,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "Upload aborted"
                );
            }
            UploadEvent::CleanupFailed {
                session_id,
                resource,
                error,
            } => {
                error!(target: "pkgreg::events", source, %event_id, session = %session_id, resource = %resource, error = %error, "Upload cleanup failed");
            }
        },

        AppEvent::Package(event) => match event {
            PackageEvent::Fetched {
                identity,
                download_url,
            } => {
                info!(target: "pkgreg::events", source, %event_id, correlation, identity = %identity, download_url, "Package fetched");
            }
            PackageEvent::ListCompleted {
                organization_id,
                count,
            } => {
                info!(target: "pkgreg::events", source, %event_id, correlation, organization = %organization_id, count, "Packages listed");
            }
            PackageEvent::Deleted { identity } => {
                info!(target: "pkgreg::events", source, %event_id, correlation, identity = %identity, "Package deleted");
            }
            PackageEvent::DeleteCompleted {
                organization_id,
                deleted,
                failed,
            } => {
                info!(target: "pkgreg::events", source, %event_id, correlation, organization = %organization_id, deleted, failed, "Delete completed");
            }
            PackageEvent::BlobOrphaned { identity, location } => {
                warn!(target: "pkgreg::events", source, %event_id, correlation, identity = %identity, location = %location, "Blob orphaned");
            }
            PackageEvent::OperationFailed {
                operation,
                identity,
                failure,
            } => {
                error!(
                    target: "pkgreg::events",
                    source,
                    %event_id,
                    correlation,
                    operation = %operation,
                    identity = ?identity,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "Operation failed"
                );
            }
        },

        AppEvent::Sweep(event) => match event {
            SweepEvent::Started { older_than_secs } => {
                info!(target: "pkgreg::events", source, %event_id, older_than_secs, "Sweep started");
            }
            SweepEvent::Reclaimed { identity, staging } => {
                debug!(target: "pkgreg::events", source, %event_id, identity = %identity, staging = %staging, "Abandoned upload reclaimed");
            }
            SweepEvent::Completed {
                reclaimed,
                duration_ms,
            } => {
                info!(target: "pkgreg::events", source, %event_id, reclaimed, duration_ms, "Sweep completed");
            }
            SweepEvent::Failed { failure } => {
                error!(
                    target: "pkgreg::events",
                    source,
                    %event_id,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    "Sweep failed"
                );
            }
        },
    }
}
