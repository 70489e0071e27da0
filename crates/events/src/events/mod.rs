use serde::{Deserialize, Serialize};

use crate::EventSource;
use pkgreg_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    /// Stable error code, when the error carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Construct a new failure context.
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod general;
pub mod package;
pub mod upload;

pub use general::*;
pub use package::*;
pub use upload::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, retries)
    General(GeneralEvent),

    /// Create-package sessions
    Upload(UploadEvent),

    /// Get, list and delete
    Package(PackageEvent),

    /// Abandoned-upload reclamation
    Sweep(SweepEvent),
}

impl AppEvent {
    /// Identify the source domain for this event (used for metadata/logging).
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::GENERAL,
            Self::Upload(_) => EventSource::UPLOAD,
            Self::Package(_) => EventSource::PACKAGE,
            Self::Sweep(_) => EventSource::SWEEP,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::General(GeneralEvent::Error { .. })
            | Self::Upload(UploadEvent::CleanupFailed { .. })
            | Self::Package(PackageEvent::OperationFailed { .. })
            | Self::Sweep(SweepEvent::Failed { .. }) => Level::ERROR,

            Self::General(GeneralEvent::Warning { .. } | GeneralEvent::RetryScheduled { .. })
            | Self::Upload(UploadEvent::Aborted { .. })
            | Self::Package(PackageEvent::BlobOrphaned { .. }) => Level::WARN,

            Self::General(GeneralEvent::DebugLog { .. })
            | Self::Upload(UploadEvent::ChunkReceived { .. } | UploadEvent::Verified { .. })
            | Self::Sweep(SweepEvent::Reclaimed { .. }) => Level::DEBUG,

            _ => Level::INFO,
        }
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::General(_) => "pkgreg::events::general",
            Self::Upload(_) => "pkgreg::events::upload",
            Self::Package(_) => "pkgreg::events::package",
            Self::Sweep(_) => "pkgreg::events::sweep",
        }
    }
}
