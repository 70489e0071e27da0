//! Integration tests for error types

#[cfg(test)]
mod tests {
    use pkgreg_errors::*;

    #[test]
    fn test_error_conversion() {
        let pkg_err = PackageError::NotFound {
            identity: "org1/tool@1.0.0 (archive)".into(),
        };
        let err: Error = pkg_err.into();
        assert!(matches!(err, Error::Package(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.identity(), Some("org1/tool@1.0.0 (archive)"));
    }

    #[test]
    fn test_error_display() {
        let err = StorageError::DiskFull {
            path: "/var/lib/pkgreg".into(),
        };
        assert_eq!(err.to_string(), "disk full: /var/lib/pkgreg");
    }

    #[test]
    fn test_error_clone() {
        let err = PackageError::Conflict {
            identity: "org1/model@2 (ml_model)".into(),
        };
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test");
        let storage_err = StorageError::from_io_with_path(&io_err, std::path::Path::new("/x"));
        assert!(matches!(storage_err, StorageError::PermissionDenied { .. }));

        let err: Error = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow").into();
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
        assert!(err.is_transient());
    }

    #[test]
    fn test_kind_mapping_covers_taxonomy() {
        let cases: Vec<(Error, ErrorKind)> = vec![
            (
                PackageError::UnknownPackageType {
                    value: "binary".into(),
                }
                .into(),
                ErrorKind::InvalidIdentity,
            ),
            (
                PackageError::AlreadyExists {
                    identity: "a".into(),
                }
                .into(),
                ErrorKind::AlreadyExists,
            ),
            (
                PackageError::ChecksumMismatch {
                    identity: "a".into(),
                    expected: "blake3:00".into(),
                    actual: "blake3:11".into(),
                }
                .into(),
                ErrorKind::ChecksumMismatch,
            ),
            (
                PackageError::ChunkTooLarge {
                    identity: "a".into(),
                    limit: 1,
                    size: 2,
                }
                .into(),
                ErrorKind::PayloadTooLarge,
            ),
            (
                PackageError::Canceled {
                    identity: "a".into(),
                }
                .into(),
                ErrorKind::Canceled,
            ),
            (Error::Cancelled, ErrorKind::Canceled),
            (
                CatalogError::Busy {
                    message: "locked".into(),
                }
                .into(),
                ErrorKind::StorageFailure,
            ),
            (
                ConfigError::Invalid {
                    message: "bad".into(),
                }
                .into(),
                ErrorKind::Internal,
            ),
        ];

        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{err}");
        }
    }

    #[test]
    fn test_only_storage_faults_are_transient() {
        let busy: Error = CatalogError::Busy {
            message: "locked".into(),
        }
        .into();
        assert!(busy.is_transient());

        let conflict: Error = PackageError::Conflict {
            identity: "a".into(),
        }
        .into();
        assert!(!conflict.is_transient());
        assert!(conflict.is_retryable());

        let missing: Error = StorageError::BlobNotFound { key: "k".into() }.into();
        assert!(!missing.is_transient());
    }

    #[test]
    fn test_user_codes_are_namespaced() {
        let err: Error = PackageError::PayloadTooLarge {
            identity: "a".into(),
            limit: 10,
            size: 11,
        }
        .into();
        assert_eq!(err.user_code(), Some("package.payload_too_large"));
        assert!(err.user_hint().is_some());
    }
}
