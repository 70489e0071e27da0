//! Integration tests for hash crate

#[cfg(test)]
mod tests {
    use pkgreg_hash::*;
    use pkgreg_types::ChecksumAlgorithm;
    use tempfile::tempdir;
    use tokio::fs;

    #[tokio::test]
    async fn test_verify_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("artifact.tar");

        let data = b"verify this content";
        fs::write(&file_path, data).await.unwrap();

        let checksum = digest(ChecksumAlgorithm::Blake3, data);
        assert!(verify_file(&file_path, &checksum).await.unwrap());

        let wrong = digest(ChecksumAlgorithm::Blake3, b"different content");
        assert!(!verify_file(&file_path, &wrong).await.unwrap());
    }

    #[tokio::test]
    async fn test_hash_file_respects_algorithm() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("model.bin");
        fs::write(&file_path, vec![7u8; 100_000]).await.unwrap();

        let sha = hash_file(&file_path, ChecksumAlgorithm::Sha256).await.unwrap();
        assert_eq!(sha.algorithm(), ChecksumAlgorithm::Sha256);
        assert_eq!(sha, digest(ChecksumAlgorithm::Sha256, &vec![7u8; 100_000]));
    }

    #[tokio::test]
    async fn test_hash_missing_file() {
        let dir = tempdir().unwrap();
        let result = hash_file(&dir.path().join("missing"), ChecksumAlgorithm::Blake3).await;
        assert!(result.is_err());
    }
}
