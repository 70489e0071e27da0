//! Content checksum representation
//!
//! A checksum is rendered as `algorithm:hexdigest`, e.g.
//! `blake3:d74981ef...`. A bare 64-character hex string is read as BLAKE3.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    #[default]
    Blake3,
    Sha256,
}

impl ChecksumAlgorithm {
    /// Canonical lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blake3 => "blake3",
            Self::Sha256 => "sha256",
        }
    }

    /// Digest length in bytes
    #[must_use]
    pub fn digest_len(self) -> usize {
        match self {
            Self::Blake3 | Self::Sha256 => 32,
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = ChecksumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blake3" => Ok(Self::Blake3),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            other => Err(ChecksumParseError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Failure to parse a textual checksum
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChecksumParseError {
    #[error("unknown checksum algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("invalid hex digest: {0}")]
    InvalidHex(String),

    #[error("digest must be {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}

/// An algorithm-tagged content digest
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum {
    algorithm: ChecksumAlgorithm,
    digest: Vec<u8>,
}

impl Checksum {
    /// Build from raw digest bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the digest length does not match the algorithm.
    pub fn from_bytes(
        algorithm: ChecksumAlgorithm,
        digest: impl Into<Vec<u8>>,
    ) -> Result<Self, ChecksumParseError> {
        let digest = digest.into();
        if digest.len() != algorithm.digest_len() {
            return Err(ChecksumParseError::WrongLength {
                expected: algorithm.digest_len(),
                actual: digest.len(),
            });
        }
        Ok(Self { algorithm, digest })
    }

    /// Build from a 32-byte digest, which every supported algorithm produces
    #[must_use]
    pub fn from_digest(algorithm: ChecksumAlgorithm, digest: [u8; 32]) -> Self {
        Self {
            algorithm,
            digest: digest.to_vec(),
        }
    }

    /// Parse from a hex digest for a known algorithm
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not valid hex of the right length.
    pub fn from_hex(algorithm: ChecksumAlgorithm, hex_digest: &str) -> Result<Self, ChecksumParseError> {
        let digest = hex::decode(hex_digest.trim())
            .map_err(|e| ChecksumParseError::InvalidHex(e.to_string()))?;
        Self::from_bytes(algorithm, digest)
    }

    /// Parse `algorithm:hex` (or bare hex, read as BLAKE3)
    ///
    /// # Errors
    ///
    /// Returns an error if the algorithm is unknown or the digest is malformed.
    pub fn parse(s: &str) -> Result<Self, ChecksumParseError> {
        match s.split_once(':') {
            Some((algo, digest)) => Self::from_hex(algo.parse()?, digest),
            None => Self::from_hex(ChecksumAlgorithm::Blake3, s),
        }
    }

    #[must_use]
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.digest
    }

    /// Lowercase hex digest without the algorithm prefix
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.digest)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

impl FromStr for Checksum {
    type Err = ChecksumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Checksum {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_BLAKE3: &str = "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24";

    #[test]
    fn test_parse_prefixed_and_bare() {
        let prefixed = Checksum::parse(&format!("blake3:{HELLO_BLAKE3}")).unwrap();
        let bare = Checksum::parse(HELLO_BLAKE3).unwrap();
        assert_eq!(prefixed, bare);
        assert_eq!(prefixed.to_string(), format!("blake3:{HELLO_BLAKE3}"));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            Checksum::parse("md5:00"),
            Err(ChecksumParseError::UnknownAlgorithm(_))
        ));
        assert!(matches!(
            Checksum::parse("sha256:zz"),
            Err(ChecksumParseError::InvalidHex(_))
        ));
        assert!(matches!(
            Checksum::parse("sha256:abcd"),
            Err(ChecksumParseError::WrongLength {
                expected: 32,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_uppercase_hex_normalizes() {
        let upper = Checksum::parse(&HELLO_BLAKE3.to_uppercase()).unwrap();
        assert_eq!(upper.to_hex(), HELLO_BLAKE3);
    }
}
