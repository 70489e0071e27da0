//! Request and response messages for the four registry operations

use crate::{Checksum, PackageIdentity, PackageRecord, PackageSelector, PackageType};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use pkgreg_errors::Error;
use serde::{Deserialize, Serialize};

/// Metadata carried by the first message of an upload stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub identity: PackageIdentity,
    /// Client-declared digest; verified at commit when present
    pub checksum: Option<Checksum>,
}

/// One message of the client-streaming `CreatePackage` call
#[derive(Debug, Clone)]
pub enum CreatePackageRequest {
    Info(PackageInfo),
    Contents(Bytes),
}

impl CreatePackageRequest {
    #[must_use]
    pub fn info(identity: PackageIdentity, checksum: Option<Checksum>) -> Self {
        Self::Info(PackageInfo { identity, checksum })
    }

    #[must_use]
    pub fn contents(bytes: impl Into<Bytes>) -> Self {
        Self::Contents(bytes.into())
    }
}

/// Failure reported by the transport carrying an upload stream
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("stream canceled by client")]
    Canceled,

    #[error("transport failure: {0}")]
    Broken(String),
}

/// Summary returned once an upload is committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePackageResponse {
    pub identity: PackageIdentity,
    pub size: u64,
    pub checksum: Checksum,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePackageRequest {
    pub organization_id: String,
    pub packages: Vec<PackageSelector>,
}

/// Result of deleting a single identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub identity: PackageIdentity,
    pub result: Result<(), Error>,
}

impl DeleteOutcome {
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeletePackageResponse {
    pub results: Vec<DeleteOutcome>,
}

impl DeletePackageResponse {
    /// Outcome for a particular identity, if it was part of the request
    #[must_use]
    pub fn outcome(&self, identity: &PackageIdentity) -> Option<&DeleteOutcome> {
        self.results.iter().find(|o| o.identity == *identity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetPackageRequest {
    pub organization_id: String,
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub package_type: PackageType,
    #[serde(default)]
    pub include_download_info: bool,
}

impl GetPackageRequest {
    /// Identity addressed by this request (unvalidated)
    #[must_use]
    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity {
            organization_id: self.organization_id.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            package_type: self.package_type,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPackagesRequest {
    pub organization_id: String,
    pub name: Option<String>,
    pub version: Option<String>,
    #[serde(rename = "type")]
    pub package_type: Option<PackageType>,
    #[serde(default)]
    pub include_download_info: bool,
}

/// A time-limited retrieval URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// A record plus an optional freshly issued download URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadDescriptor {
    pub record: PackageRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<SignedUrl>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPackagesResponse {
    pub packages: Vec<DownloadDescriptor>,
}
