//! Integration tests for config

#[cfg(test)]
mod tests {
    use pkgreg_config::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to ensure env var tests don't run concurrently
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[paths]
data_dir = "/srv/pkgreg"

[catalog]
backend = "memory"

[upload]
max_chunk_size = 1024
allow_overwrite = true

[urls]
base_url = "https://cdn.example.com/pkg"
ttl = 60
        "#
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.catalog.backend, CatalogBackend::Memory);
        assert_eq!(config.upload.max_chunk_size, 1024);
        assert_eq!(
            config.upload.max_package_size,
            constants::DEFAULT_MAX_PACKAGE_SIZE
        );
        assert!(config.upload.allow_overwrite);
        assert_eq!(config.urls.base_url, "https://cdn.example.com/pkg");
        assert_eq!(config.urls.ttl().as_secs(), 60);
        assert_eq!(config.blob_dir(), PathBuf::from("/srv/pkgreg/blobs"));
        assert_eq!(
            config.catalog_path(),
            PathBuf::from("/srv/pkgreg/catalog.sqlite")
        );
        config.validate().unwrap();
    }

    #[tokio::test]
    async fn test_invalid_toml_is_parse_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[upload\nmax_chunk_size = ").unwrap();
        let err = Config::load_from_file(temp_file.path()).await.unwrap_err();
        assert!(matches!(
            err,
            pkgreg_errors::Error::Config(pkgreg_errors::ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_merge_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();

        std::env::set_var("PKGREG_CATALOG_BACKEND", "memory");
        std::env::set_var("PKGREG_ALLOW_OVERWRITE", "yes");
        std::env::set_var("PKGREG_MAX_PACKAGE_SIZE", "4096");

        let mut config = Config::default();
        config.merge_env().unwrap();

        assert_eq!(config.catalog.backend, CatalogBackend::Memory);
        assert!(config.upload.allow_overwrite);
        assert_eq!(config.upload.max_package_size, 4096);

        std::env::remove_var("PKGREG_CATALOG_BACKEND");
        std::env::remove_var("PKGREG_ALLOW_OVERWRITE");
        std::env::remove_var("PKGREG_MAX_PACKAGE_SIZE");
    }

    #[test]
    fn test_merge_env_rejects_bad_values() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();

        std::env::set_var("PKGREG_ALLOW_OVERWRITE", "sometimes");
        let mut config = Config::default();
        assert!(config.merge_env().is_err());
        std::env::remove_var("PKGREG_ALLOW_OVERWRITE");
    }

    #[test]
    fn test_validate_limits_and_key() {
        let mut config = Config::default();
        config.validate().unwrap();

        config.upload.max_chunk_size = config.upload.max_package_size + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.urls.signing_key = Some("abcd".to_string());
        assert!(config.validate().is_err());

        config.urls.signing_key = Some("11".repeat(32));
        assert_eq!(config.urls.signing_key_bytes().unwrap(), Some([0x11; 32]));
    }
}
