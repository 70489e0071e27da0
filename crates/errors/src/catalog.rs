//! Catalog (metadata store) error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum CatalogError {
    #[error("invalid record transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("database error: {message}")]
    DatabaseError { message: String },

    #[error("database busy: {message}")]
    Busy { message: String },

    #[error("transaction failed: {message}")]
    TransactionFailed { message: String },

    #[error("catalog corrupted: {message}")]
    Corrupted { message: String },

    #[error("migration failed: {message}")]
    MigrationFailed { message: String },
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed => {
                Self::Busy {
                    message: err.to_string(),
                }
            }
            sqlx::Error::Database(db) if db.message().contains("database is locked") => {
                Self::Busy {
                    message: err.to_string(),
                }
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => Self::Corrupted {
                message: err.to_string(),
            },
            _ => Self::DatabaseError {
                message: err.to_string(),
            },
        }
    }
}

impl UserFacingError for CatalogError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Busy { .. } => Some("The catalog is under load; retry with backoff."),
            Self::MigrationFailed { .. } | Self::Corrupted { .. } => {
                Some("Inspect the catalog database; it may need to be restored.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy { .. } | Self::TransactionFailed { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::InvalidTransition { .. } => "catalog.invalid_transition",
            Self::DatabaseError { .. } => "catalog.database_error",
            Self::Busy { .. } => "catalog.busy",
            Self::TransactionFailed { .. } => "catalog.transaction_failed",
            Self::Corrupted { .. } => "catalog.corrupted",
            Self::MigrationFailed { .. } => "catalog.migration_failed",
        };
        Some(code)
    }
}
