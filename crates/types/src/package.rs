//! Package identity and catalog record types

use crate::Checksum;
use chrono::{DateTime, Utc};
use pkgreg_errors::PackageError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Catalog record identifier
pub type RecordId = Uuid;

/// Version alias resolved by lookups to the newest committed version
pub const LATEST_VERSION: &str = "latest";

/// Maximum length, in bytes, of any identity field
const MAX_FIELD_LEN: usize = 256;

/// Recognized package kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    Archive,
    MlModel,
    MlTraining,
    Module,
    SlamMap,
    Dataset,
}

impl PackageType {
    pub const ALL: [Self; 6] = [
        Self::Archive,
        Self::MlModel,
        Self::MlTraining,
        Self::Module,
        Self::SlamMap,
        Self::Dataset,
    ];

    /// Canonical snake_case name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::MlModel => "ml_model",
            Self::MlTraining => "ml_training",
            Self::Module => "module",
            Self::SlamMap => "slam_map",
            Self::Dataset => "dataset",
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageType {
    type Err = PackageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| PackageError::UnknownPackageType {
                value: s.to_string(),
            })
    }
}

// Hyphenated spellings are accepted on the command line too
impl clap::ValueEnum for PackageType {
    fn value_variants<'a>() -> &'a [Self] {
        &Self::ALL
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        let value = clap::builder::PossibleValue::new(self.as_str());
        Some(match self {
            Self::MlModel => value.alias("ml-model"),
            Self::MlTraining => value.alias("ml-training"),
            Self::SlamMap => value.alias("slam-map"),
            _ => value,
        })
    }
}

/// Unique address of one package: `(organization, name, version, type)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub organization_id: String,
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub package_type: PackageType,
}

impl PackageIdentity {
    /// Create a validated identity
    ///
    /// # Errors
    ///
    /// Returns `PackageError::InvalidIdentity` if any field is empty or
    /// contains characters that cannot appear in a storage key.
    pub fn new(
        organization_id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        package_type: PackageType,
    ) -> Result<Self, PackageError> {
        let identity = Self {
            organization_id: organization_id.into(),
            name: name.into(),
            version: version.into(),
            package_type,
        };
        identity.validate()?;
        Ok(identity)
    }

    /// Check every field for emptiness and key-safety
    ///
    /// # Errors
    ///
    /// Returns `PackageError::InvalidIdentity` naming the offending field.
    pub fn validate(&self) -> Result<(), PackageError> {
        for (field, value) in [
            ("organization_id", &self.organization_id),
            ("name", &self.name),
            ("version", &self.version),
        ] {
            if let Err(reason) = validate_field(value) {
                return Err(PackageError::InvalidIdentity {
                    identity: self.to_string(),
                    reason: format!("{field} {reason}"),
                });
            }
        }
        Ok(())
    }

    /// Validate for upload, which additionally reserves the `latest` alias
    ///
    /// # Errors
    ///
    /// Returns `PackageError::InvalidIdentity` if validation fails.
    pub fn validate_for_upload(&self) -> Result<(), PackageError> {
        self.validate()?;
        if self.version.eq_ignore_ascii_case(LATEST_VERSION) {
            return Err(PackageError::InvalidIdentity {
                identity: self.to_string(),
                reason: format!("version `{LATEST_VERSION}` is reserved"),
            });
        }
        Ok(())
    }

    /// Whether this identity asks for the newest version
    #[must_use]
    pub fn is_latest_alias(&self) -> bool {
        self.version.eq_ignore_ascii_case(LATEST_VERSION)
    }
}

fn validate_field(value: &str) -> Result<(), &'static str> {
    if value.is_empty() {
        return Err("must not be empty");
    }
    if value.trim() != value {
        return Err("must not have leading or trailing whitespace");
    }
    if value.len() > MAX_FIELD_LEN {
        return Err("is too long");
    }
    if value == "." || value == ".." {
        return Err("must not be a relative path component");
    }
    if value.chars().any(|c| c == '/' || c == '\\' || c.is_control()) {
        return Err("contains a path separator or control character");
    }
    Ok(())
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{} ({})",
            self.organization_id, self.name, self.version, self.package_type
        )
    }
}

impl Ord for PackageIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.organization_id
            .cmp(&other.organization_id)
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.version.cmp(&other.version))
            .then_with(|| self.package_type.cmp(&other.package_type))
    }
}

impl PartialOrd for PackageIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Identity within an organization, as sent by delete requests
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageSelector {
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub package_type: PackageType,
}

impl PackageSelector {
    /// Scope this selector to an organization
    #[must_use]
    pub fn scoped(&self, organization_id: &str) -> PackageIdentity {
        PackageIdentity {
            organization_id: organization_id.to_string(),
            name: self.name.clone(),
            version: self.version.clone(),
            package_type: self.package_type,
        }
    }
}

/// Opaque key addressing bytes in the blob store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobKey(String);

impl BlobKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Permanent key for an upload of `identity`
    ///
    /// The upload id keeps a re-upload of the same identity from ever sharing
    /// a key with the blob it supersedes.
    #[must_use]
    pub fn for_package(identity: &PackageIdentity, upload_id: &Uuid) -> Self {
        Self(format!(
            "packages/{}/{}/{}/{}/{}",
            identity.organization_id,
            identity.package_type,
            identity.name,
            identity.version,
            upload_id.simple()
        ))
    }

    /// Staging key for an in-flight upload
    #[must_use]
    pub fn staging(upload_id: &Uuid) -> Self {
        Self(format!("staging/{}", upload_id.simple()))
    }

    /// Whether this key lives in the staging area
    #[must_use]
    pub fn is_staging(&self) -> bool {
        self.0.starts_with("staging/")
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog lifecycle state of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    Pending,
    Committed,
}

impl PackageStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Committed => "committed",
        }
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "committed" => Ok(Self::Committed),
            other => Err(format!("unknown package status: {other}")),
        }
    }
}

/// Catalog entry for one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub id: RecordId,
    pub identity: PackageIdentity,
    pub size: u64,
    /// Set once the upload has been verified; `None` while pending
    pub checksum: Option<Checksum>,
    pub created_at: DateTime<Utc>,
    pub location: BlobKey,
    pub status: PackageStatus,
}

impl PackageRecord {
    /// Fresh pending record pointing at a staging area
    #[must_use]
    pub fn pending(identity: PackageIdentity, staging: BlobKey) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            size: 0,
            checksum: None,
            created_at: Utc::now(),
            location: staging,
            status: PackageStatus::Pending,
        }
    }

    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.status == PackageStatus::Committed
    }
}

/// Listing filter; `organization_id` is always an exact match
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilter {
    pub organization_id: String,
    pub name: Option<String>,
    pub version: Option<String>,
    pub package_type: Option<PackageType>,
}

impl ListFilter {
    #[must_use]
    pub fn for_organization(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_type(mut self, package_type: PackageType) -> Self {
        self.package_type = Some(package_type);
        self
    }

    /// Whether `identity` satisfies every set field
    #[must_use]
    pub fn matches(&self, identity: &PackageIdentity) -> bool {
        identity.organization_id == self.organization_id
            && self.name.as_ref().is_none_or(|n| *n == identity.name)
            && self.version.as_ref().is_none_or(|v| *v == identity.version)
            && self
                .package_type
                .is_none_or(|t| t == identity.package_type)
    }
}

/// Listing order: `(name, version)` ascending, type as tie-breaker
#[must_use]
pub fn listing_order(a: &PackageRecord, b: &PackageRecord) -> Ordering {
    a.identity
        .name
        .cmp(&b.identity.name)
        .then_with(|| a.identity.version.cmp(&b.identity.version))
        .then_with(|| {
            a.identity
                .package_type
                .as_str()
                .cmp(b.identity.package_type.as_str())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> PackageIdentity {
        PackageIdentity::new("org1", "tool", "1.0.0", PackageType::Archive).unwrap()
    }

    #[test]
    fn test_package_type_parsing() {
        assert_eq!("ml-model".parse::<PackageType>().unwrap(), PackageType::MlModel);
        assert_eq!("SLAM_MAP".parse::<PackageType>().unwrap(), PackageType::SlamMap);
        assert!(matches!(
            "binary".parse::<PackageType>(),
            Err(PackageError::UnknownPackageType { .. })
        ));
    }

    #[test]
    fn test_identity_rejects_bad_fields() {
        for (org, name, version) in [
            ("", "tool", "1"),
            ("org", " tool", "1"),
            ("org", "a/b", "1"),
            ("org", "tool", ".."),
            ("org", "tool", "1\n"),
        ] {
            assert!(
                PackageIdentity::new(org, name, version, PackageType::Module).is_err(),
                "{org:?} {name:?} {version:?}"
            );
        }
    }

    #[test]
    fn test_latest_is_reserved_for_upload() {
        let mut id = identity();
        id.version = "latest".into();
        assert!(id.validate().is_ok());
        assert!(id.is_latest_alias());
        assert!(matches!(
            id.validate_for_upload(),
            Err(PackageError::InvalidIdentity { .. })
        ));
    }

    #[test]
    fn test_status_names() {
        for status in [PackageStatus::Pending, PackageStatus::Committed] {
            assert_eq!(status.as_str().parse::<PackageStatus>().unwrap(), status);
        }
        assert!("corrupt".parse::<PackageStatus>().is_err());
        assert!("Committed".parse::<PackageStatus>().is_err());
    }

    #[test]
    fn test_blob_keys_do_not_collide_across_uploads() {
        let id = identity();
        let a = BlobKey::for_package(&id, &Uuid::new_v4());
        let b = BlobKey::for_package(&id, &Uuid::new_v4());
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("packages/org1/archive/tool/1.0.0/"));
        assert!(BlobKey::staging(&Uuid::new_v4()).is_staging());
    }

    #[test]
    fn test_filter_matches() {
        let id = identity();
        assert!(ListFilter::for_organization("org1").matches(&id));
        assert!(ListFilter::for_organization("org1")
            .with_type(PackageType::Archive)
            .with_name("tool")
            .matches(&id));
        assert!(!ListFilter::for_organization("org2").matches(&id));
        assert!(!ListFilter::for_organization("org1")
            .with_version("2.0.0")
            .matches(&id));
    }

    #[test]
    fn test_identity_serializes_type_field() {
        let json = serde_json::to_value(identity()).unwrap();
        assert_eq!(json["type"], "archive");
    }
}
