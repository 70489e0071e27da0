use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Read and delete operations on committed packages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PackageEvent {
    /// A single package was resolved
    Fetched {
        identity: String,
        download_url: bool,
    },

    /// Listing finished
    ListCompleted {
        organization_id: String,
        count: usize,
    },

    /// One identity was removed from the catalog
    Deleted { identity: String },

    /// Batch delete finished
    DeleteCompleted {
        organization_id: String,
        deleted: usize,
        failed: usize,
    },

    /// The catalog entry was removed but its blob could not be
    BlobOrphaned { identity: String, location: String },

    /// A read or delete failed
    OperationFailed {
        operation: String,
        identity: Option<String>,
        failure: FailureContext,
    },
}
