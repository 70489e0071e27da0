#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the pkgreg package registry
//!
//! This crate provides the identity, record and protocol message types
//! shared by the catalog, the blob store, the upload pipeline and the
//! service façade.

pub mod checksum;
pub mod package;
pub mod protocol;

// Re-export commonly used types
pub use checksum::{Checksum, ChecksumAlgorithm, ChecksumParseError};
pub use package::{
    listing_order, BlobKey, ListFilter, PackageIdentity, PackageRecord, PackageSelector,
    PackageStatus, PackageType, RecordId, LATEST_VERSION,
};
pub use protocol::{
    CreatePackageRequest, CreatePackageResponse, DeleteOutcome, DeletePackageRequest,
    DeletePackageResponse, DownloadDescriptor, GetPackageRequest, ListPackagesRequest,
    ListPackagesResponse, PackageInfo, SignedUrl, TransportError,
};
pub use uuid::Uuid;
