use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Lifecycle of a single create-package session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UploadEvent {
    /// Info message accepted and a pending entry reserved
    Started {
        session_id: String,
        identity: String,
        staging: String,
    },

    /// Contents chunk appended to staging
    ChunkReceived {
        session_id: String,
        bytes: u64,
        total: u64,
    },

    /// Digest computed and compared with the declared checksum
    Verified {
        session_id: String,
        checksum: String,
        declared: bool,
    },

    /// Entry became visible
    Committed {
        session_id: String,
        identity: String,
        size: u64,
        checksum: String,
        superseded: bool,
    },

    /// Session ended without a commit; staging and pending entry cleaned up
    Aborted {
        session_id: String,
        identity: Option<String>,
        failure: FailureContext,
    },

    /// Cleanup after an abort did not complete
    CleanupFailed {
        session_id: String,
        resource: String,
        error: String,
    },
}

/// Background reclamation of abandoned uploads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SweepEvent {
    Started { older_than_secs: u64 },

    /// One abandoned pending entry and its staging blob were removed
    Reclaimed { identity: String, staging: String },

    Completed { reclaimed: usize, duration_ms: u64 },

    Failed { failure: FailureContext },
}
