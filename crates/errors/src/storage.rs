//! Blob storage error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum StorageError {
    #[error("disk full: {path}")]
    DiskFull { path: String },

    #[error("permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("blob not found: {key}")]
    BlobNotFound { key: String },

    #[error("staging area not found: {key}")]
    StagingNotFound { key: String },

    #[error("already exists: {path}")]
    AlreadyExists { path: String },

    #[error("invalid blob key: {key}")]
    InvalidKey { key: String },

    #[error("IO error: {message}")]
    IoError { message: String },

    #[error("corrupted data: {message}")]
    CorruptedData { message: String },

    #[error("atomic rename failed: {message}")]
    AtomicRenameFailed { message: String },

    #[error("signing failed: {message}")]
    SigningFailed { message: String },

    #[error("backend unavailable: {message}")]
    Unavailable { message: String },

    #[error("download URL rejected: {reason}")]
    UrlRejected { reason: String },
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        // Without a known path, avoid inventing placeholders; preserve message only
        Self::IoError {
            message: err.to_string(),
        }
    }
}

impl StorageError {
    /// Convert an `io::Error` into a `StorageError` with an associated path
    #[must_use]
    pub fn from_io_with_path(err: &std::io::Error, path: &std::path::Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.display().to_string(),
            },
            std::io::ErrorKind::NotFound => Self::BlobNotFound {
                key: path.display().to_string(),
            },
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists {
                path: path.display().to_string(),
            },
            _ => Self::IoError {
                message: format!("{}: {}", path.display(), err),
            },
        }
    }
}

impl UserFacingError for StorageError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::DiskFull { .. } => Some("Free up disk space in the blob store and retry."),
            Self::PermissionDenied { .. } => {
                Some("Adjust filesystem permissions on the blob store directory.")
            }
            Self::IoError { .. } | Self::Unavailable { .. } => {
                Some("The storage backend failed transiently; retry with backoff.")
            }
            Self::UrlRejected { .. } => Some("Request a fresh download URL."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::IoError { .. } | Self::Unavailable { .. } | Self::AtomicRenameFailed { .. }
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::DiskFull { .. } => "storage.disk_full",
            Self::PermissionDenied { .. } => "storage.permission_denied",
            Self::BlobNotFound { .. } => "storage.blob_not_found",
            Self::StagingNotFound { .. } => "storage.staging_not_found",
            Self::AlreadyExists { .. } => "storage.already_exists",
            Self::InvalidKey { .. } => "storage.invalid_key",
            Self::IoError { .. } => "storage.io_error",
            Self::CorruptedData { .. } => "storage.corrupted_data",
            Self::AtomicRenameFailed { .. } => "storage.atomic_rename_failed",
            Self::SigningFailed { .. } => "storage.signing_failed",
            Self::Unavailable { .. } => "storage.unavailable",
            Self::UrlRejected { .. } => "storage.url_rejected",
        };
        Some(code)
    }
}
