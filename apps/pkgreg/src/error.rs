//! CLI error handling

use std::fmt;

use pkgreg_errors::UserFacingError;

/// CLI-specific error type
#[derive(Debug)]
pub enum CliError {
    /// Configuration error
    Config(pkgreg_errors::ConfigError),
    /// Registry operation error
    Registry(pkgreg_errors::Error),
    /// Invalid command arguments
    InvalidArguments(String),
    /// Some items of a batch operation failed
    PartialFailure { failed: usize, total: usize },
    /// I/O error
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {e}"),
            CliError::Registry(e) => {
                let message = e.user_message();
                write!(f, "{message}")?;
                if let Some(code) = e.user_code() {
                    write!(f, "\n  Code: {code}")?;
                }
                if let Some(hint) = e.user_hint() {
                    write!(f, "\n  Hint: {hint}")?;
                }
                if e.is_retryable() {
                    write!(f, "\n  Retry: safe to retry this operation.")?;
                }
                Ok(())
            }
            CliError::InvalidArguments(msg) => write!(f, "Invalid arguments: {msg}"),
            CliError::PartialFailure { failed, total } => {
                write!(f, "{failed} of {total} items failed")
            }
            CliError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Registry(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<pkgreg_errors::ConfigError> for CliError {
    fn from(e: pkgreg_errors::ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<pkgreg_errors::Error> for CliError {
    fn from(e: pkgreg_errors::Error) -> Self {
        match e {
            pkgreg_errors::Error::Config(e) => CliError::Config(e),
            other => CliError::Registry(other),
        }
    }
}

impl From<pkgreg_errors::PackageError> for CliError {
    fn from(e: pkgreg_errors::PackageError) -> Self {
        CliError::Registry(e.into())
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}
