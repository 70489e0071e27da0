//! Default locations and limits for a pkgreg installation

pub const DATA_DIR: &str = "/var/lib/pkgreg";

pub const BLOB_DIR_NAME: &str = "blobs";
pub const CATALOG_FILE_NAME: &str = "catalog.sqlite";

pub const DEFAULT_URL_BASE: &str = "http://localhost:8080/blobs";

pub const MIB: u64 = 1024 * 1024;

pub const DEFAULT_MAX_CHUNK_SIZE: u64 = 4 * MIB;
pub const DEFAULT_MAX_PACKAGE_SIZE: u64 = 2 * 1024 * MIB; // 2GB
