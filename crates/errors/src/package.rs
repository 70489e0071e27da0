//! Package-level error types

use std::borrow::Cow;

use crate::{ErrorKind, UserFacingError};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum PackageError {
    #[error("invalid package identity {identity}: {reason}")]
    InvalidIdentity { identity: String, reason: String },

    #[error("unknown package type: {value}")]
    UnknownPackageType { value: String },

    #[error("upload stream did not start with package info: {reason}")]
    MissingInfo { reason: String },

    #[error("invalid checksum for {identity}: {reason}")]
    InvalidChecksum { identity: String, reason: String },

    #[error("package already exists: {identity}")]
    AlreadyExists { identity: String },

    #[error("package not found: {identity}")]
    NotFound { identity: String },

    #[error("upload already in progress: {identity}")]
    Conflict { identity: String },

    #[error("checksum mismatch for {identity}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        identity: String,
        expected: String,
        actual: String,
    },

    #[error("package {identity} exceeds size limit of {limit} bytes (received {size})")]
    PayloadTooLarge {
        identity: String,
        limit: u64,
        size: u64,
    },

    #[error("chunk for {identity} exceeds chunk limit of {limit} bytes (received {size})")]
    ChunkTooLarge {
        identity: String,
        limit: u64,
        size: u64,
    },

    #[error("upload canceled: {identity}")]
    Canceled { identity: String },
}

impl PackageError {
    /// Taxonomy kind for this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidIdentity { .. }
            | Self::UnknownPackageType { .. }
            | Self::MissingInfo { .. }
            | Self::InvalidChecksum { .. } => ErrorKind::InvalidIdentity,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            Self::PayloadTooLarge { .. } | Self::ChunkTooLarge { .. } => {
                ErrorKind::PayloadTooLarge
            }
            Self::Canceled { .. } => ErrorKind::Canceled,
        }
    }

    /// Offending identity, if the error is tied to one
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        match self {
            Self::InvalidIdentity { identity, .. }
            | Self::InvalidChecksum { identity, .. }
            | Self::AlreadyExists { identity }
            | Self::NotFound { identity }
            | Self::Conflict { identity }
            | Self::ChecksumMismatch { identity, .. }
            | Self::PayloadTooLarge { identity, .. }
            | Self::ChunkTooLarge { identity, .. }
            | Self::Canceled { identity } => Some(identity),
            Self::UnknownPackageType { .. } | Self::MissingInfo { .. } => None,
        }
    }
}

impl UserFacingError for PackageError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::AlreadyExists { .. } => Some("Choose a new version for the package."),
            Self::Conflict { .. } => Some("Wait for the other upload to finish, then retry."),
            Self::ChecksumMismatch { .. } => Some("Re-upload the package; the bytes were altered."),
            Self::PayloadTooLarge { .. } | Self::ChunkTooLarge { .. } => {
                Some("Reduce the artifact or chunk size below the registry limits.")
            }
            Self::UnknownPackageType { .. } => Some(
                "Use one of: archive, ml_model, ml_training, module, slam_map, dataset.",
            ),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::InvalidIdentity { .. } => "package.invalid_identity",
            Self::UnknownPackageType { .. } => "package.unknown_type",
            Self::MissingInfo { .. } => "package.missing_info",
            Self::InvalidChecksum { .. } => "package.invalid_checksum",
            Self::AlreadyExists { .. } => "package.already_exists",
            Self::NotFound { .. } => "package.not_found",
            Self::Conflict { .. } => "package.conflict",
            Self::ChecksumMismatch { .. } => "package.checksum_mismatch",
            Self::PayloadTooLarge { .. } => "package.payload_too_large",
            Self::ChunkTooLarge { .. } => "package.chunk_too_large",
            Self::Canceled { .. } => "package.canceled",
        };
        Some(code)
    }
}
