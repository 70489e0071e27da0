#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Streaming checksum verification for pkgreg
//!
//! Uploads arrive as a sequence of chunks; [`ChecksumVerifier`] folds each
//! chunk into a running digest so the artifact never has to be re-read to be
//! verified. BLAKE3 is the default algorithm, SHA-256 is accepted when the
//! client declares it.

use pkgreg_errors::{Error, StorageError};
use pkgreg_types::{Checksum, ChecksumAlgorithm};
use sha2::Digest;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Size of chunks for streaming hash computation
const CHUNK_SIZE: usize = 64 * 1024; // 64KB

enum HasherState {
    Blake3(Box<blake3::Hasher>),
    Sha256(sha2::Sha256),
}

/// Incremental digest accumulator
pub struct ChecksumVerifier {
    state: HasherState,
    bytes_seen: u64,
}

impl ChecksumVerifier {
    #[must_use]
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        let state = match algorithm {
            ChecksumAlgorithm::Blake3 => HasherState::Blake3(Box::new(blake3::Hasher::new())),
            ChecksumAlgorithm::Sha256 => HasherState::Sha256(sha2::Sha256::new()),
        };
        Self {
            state,
            bytes_seen: 0,
        }
    }

    /// Incorporate the next chunk
    pub fn update(&mut self, bytes: &[u8]) {
        match &mut self.state {
            HasherState::Blake3(hasher) => {
                hasher.update(bytes);
            }
            HasherState::Sha256(hasher) => hasher.update(bytes),
        }
        self.bytes_seen += bytes.len() as u64;
    }

    #[must_use]
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        match self.state {
            HasherState::Blake3(_) => ChecksumAlgorithm::Blake3,
            HasherState::Sha256(_) => ChecksumAlgorithm::Sha256,
        }
    }

    /// Total bytes fed so far
    #[must_use]
    pub fn bytes_seen(&self) -> u64 {
        self.bytes_seen
    }

    /// Consume the accumulator and produce the digest
    #[must_use]
    pub fn finalize(self) -> Checksum {
        match self.state {
            HasherState::Blake3(hasher) => {
                Checksum::from_digest(ChecksumAlgorithm::Blake3, *hasher.finalize().as_bytes())
            }
            HasherState::Sha256(hasher) => {
                Checksum::from_digest(ChecksumAlgorithm::Sha256, hasher.finalize().into())
            }
        }
    }
}

impl std::fmt::Debug for ChecksumVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumVerifier")
            .field("algorithm", &self.algorithm())
            .field("bytes_seen", &self.bytes_seen)
            .finish()
    }
}

/// Compute the checksum of a byte slice
#[must_use]
pub fn digest(algorithm: ChecksumAlgorithm, data: &[u8]) -> Checksum {
    let mut verifier = ChecksumVerifier::new(algorithm);
    verifier.update(data);
    verifier.finalize()
}

/// Compute the checksum of a file
///
/// # Errors
/// Returns an error if the file cannot be opened, read, or if any I/O operation fails.
pub async fn hash_file(path: &Path, algorithm: ChecksumAlgorithm) -> Result<Checksum, Error> {
    let mut file = File::open(path)
        .await
        .map_err(|e| StorageError::from_io_with_path(&e, path))?;

    let mut verifier = ChecksumVerifier::new(algorithm);
    let mut buffer = vec![0; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        verifier.update(&buffer[..n]);
    }

    Ok(verifier.finalize())
}

/// Compute checksum while copying data to a writer
///
/// # Errors
/// Returns an error if reading from the reader or writing to the writer fails.
pub async fn hash_and_copy<R, W>(
    mut reader: R,
    mut writer: W,
    algorithm: ChecksumAlgorithm,
) -> Result<(Checksum, u64), Error>
where
    R: AsyncReadExt + Unpin,
    W: AsyncWriteExt + Unpin,
{
    let mut verifier = ChecksumVerifier::new(algorithm);
    let mut buffer = vec![0; CHUNK_SIZE];

    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }

        verifier.update(&buffer[..n]);
        writer.write_all(&buffer[..n]).await?;
    }

    writer.flush().await?;
    let total_bytes = verifier.bytes_seen();
    Ok((verifier.finalize(), total_bytes))
}

/// Verify a file matches an expected checksum
///
/// # Errors
/// Returns an error if the file cannot be read or hashed.
pub async fn verify_file(path: &Path, expected: &Checksum) -> Result<bool, Error> {
    let actual = hash_file(path, expected.algorithm()).await?;
    Ok(actual == *expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_blake3_digest() {
        let checksum = digest(ChecksumAlgorithm::Blake3, b"hello world");

        // Known BLAKE3 hash of "hello world"
        let expected = "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24";
        assert_eq!(checksum.to_hex(), expected);
    }

    #[test]
    fn test_known_sha256_digest() {
        let checksum = digest(ChecksumAlgorithm::Sha256, b"hello world");
        let expected = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
        assert_eq!(checksum.to_hex(), expected);
    }

    #[test]
    fn test_chunked_update_matches_one_shot() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        for algorithm in [ChecksumAlgorithm::Blake3, ChecksumAlgorithm::Sha256] {
            let mut verifier = ChecksumVerifier::new(algorithm);
            for chunk in data.chunks(7_919) {
                verifier.update(chunk);
            }
            assert_eq!(verifier.bytes_seen(), data.len() as u64);
            assert_eq!(verifier.finalize(), digest(algorithm, &data));
        }
    }

    #[test]
    fn test_empty_input() {
        let verifier = ChecksumVerifier::new(ChecksumAlgorithm::Blake3);
        assert_eq!(verifier.bytes_seen(), 0);
        assert_eq!(
            verifier.finalize(),
            digest(ChecksumAlgorithm::Blake3, &[])
        );
    }

    #[tokio::test]
    async fn test_hash_and_copy() {
        let data = b"data to copy";
        let reader = std::io::Cursor::new(data);
        let mut writer = Vec::new();

        let (checksum, bytes) = hash_and_copy(reader, &mut writer, ChecksumAlgorithm::Sha256)
            .await
            .unwrap();

        assert_eq!(writer, data);
        assert_eq!(bytes, data.len() as u64);
        assert_eq!(checksum, digest(ChecksumAlgorithm::Sha256, data));
    }
}
