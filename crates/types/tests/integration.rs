//! Integration tests for types

#[cfg(test)]
mod tests {
    use pkgreg_types::*;
    use proptest::prelude::*;

    #[test]
    fn test_record_serialization() {
        let identity =
            PackageIdentity::new("org1", "arm-model", "2.1", PackageType::MlModel).unwrap();
        let record = PackageRecord::pending(identity.clone(), BlobKey::staging(&Uuid::new_v4()));

        let json = serde_json::to_string(&record).unwrap();
        let back: PackageRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.identity, identity);
        assert_eq!(back.status, PackageStatus::Pending);
        assert!(back.checksum.is_none());
    }

    #[test]
    fn test_checksum_serializes_as_string() {
        let checksum = Checksum::from_bytes(ChecksumAlgorithm::Sha256, vec![0xab; 32]).unwrap();
        let json = serde_json::to_string(&checksum).unwrap();
        assert_eq!(json, format!("\"sha256:{}\"", "ab".repeat(32)));
    }

    #[test]
    fn test_selector_scoping() {
        let selector = PackageSelector {
            name: "nav".into(),
            version: "0.3.0".into(),
            package_type: PackageType::Module,
        };
        let identity = selector.scoped("org7");
        assert_eq!(identity.organization_id, "org7");
        assert!(identity.validate().is_ok());
    }

    fn field() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9][a-zA-Z0-9._-]{0,31}".prop_filter("not a path component", |s| {
            s != "." && s != ".."
        })
    }

    proptest! {
        #[test]
        fn prop_well_formed_identities_validate(
            org in field(),
            name in field(),
            version in field(),
            idx in 0usize..PackageType::ALL.len(),
        ) {
            let identity = PackageIdentity::new(org, name, version, PackageType::ALL[idx]);
            prop_assert!(identity.is_ok());
        }

        #[test]
        fn prop_separators_never_validate(prefix in field(), suffix in field()) {
            let name = format!("{prefix}/{suffix}");
            prop_assert!(PackageIdentity::new("org", name, "1", PackageType::Archive).is_err());
        }

        #[test]
        fn prop_checksum_display_parses_back(bytes in proptest::collection::vec(any::<u8>(), 32)) {
            for algorithm in [ChecksumAlgorithm::Blake3, ChecksumAlgorithm::Sha256] {
                let checksum = Checksum::from_bytes(algorithm, bytes.clone()).unwrap();
                prop_assert_eq!(Checksum::parse(&checksum.to_string()).unwrap(), checksum);
            }
        }
    }
}
