//! Time-limited download URLs
//!
//! [`SignedUrlIssuer`] produces URLs of the form
//! `{base}/{key}?expires={unix secs}&sig={hex}` where the signature is a
//! keyed BLAKE3 hash over the key and expiry. The same issuer can check a URL
//! it produced and recover the blob key.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use pkgreg_errors::{ConfigError, Error, StorageError};
use pkgreg_types::{BlobKey, SignedUrl};
use std::time::Duration;
use url::Url;

/// Issues retrieval URLs for stored blobs
#[async_trait]
pub trait UrlIssuer: Send + Sync + 'static {
    /// Produce a URL granting read access to `key` for `ttl`
    ///
    /// # Errors
    ///
    /// Returns `StorageError::SigningFailed` if no URL can be produced.
    async fn issue(&self, key: &BlobKey, ttl: Duration) -> Result<SignedUrl, Error>;
}

/// Keyed-hash URL signer
#[derive(Clone)]
pub struct SignedUrlIssuer {
    base_url: Url,
    key: [u8; 32],
}

impl std::fmt::Debug for SignedUrlIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedUrlIssuer")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl SignedUrlIssuer {
    /// Issuer for URLs below `base_url`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `base_url` is not an absolute
    /// URL that can carry a path.
    pub fn new(base_url: &str, key: [u8; 32]) -> Result<Self, Error> {
        let invalid = || ConfigError::InvalidValue {
            field: "urls.base_url".to_string(),
            value: base_url.to_string(),
        };
        let mut base = Url::parse(base_url).map_err(|_| invalid())?;
        if base.cannot_be_a_base() {
            return Err(invalid().into());
        }
        base.set_query(None);
        base.set_fragment(None);
        if let Ok(mut segments) = base.path_segments_mut() {
            segments.pop_if_empty();
        }
        Ok(Self {
            base_url: base,
            key,
        })
    }

    /// Issuer with a fresh random key; URLs do not survive a restart
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `base_url` is unusable.
    pub fn with_random_key(base_url: &str) -> Result<Self, Error> {
        Self::new(base_url, rand::random())
    }

    fn signature(&self, key: &str, expires: i64) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(key.as_bytes());
        hasher.update(b"\n");
        hasher.update(expires.to_string().as_bytes());
        hasher.finalize()
    }

    fn base_segments(&self) -> impl Iterator<Item = &str> {
        self.base_url
            .path_segments()
            .into_iter()
            .flatten()
            .filter(|segment| !segment.is_empty())
    }

    /// Produce a URL that expires at a fixed instant
    #[must_use]
    pub fn sign(&self, key: &BlobKey, expires_at: DateTime<Utc>) -> SignedUrl {
        let expires = expires_at.timestamp();
        let sig = self.signature(key.as_str(), expires);

        let mut url = self.base_url.clone();
        // the base is checked to be path-capable in `new`
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(key.as_str().split('/'));
        }
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("sig", &sig.to_hex());

        SignedUrl {
            url: url.into(),
            expires_at,
        }
    }

    /// Check a URL produced by this issuer and return the blob key it grants
    ///
    /// # Errors
    ///
    /// Returns `StorageError::UrlRejected` if the URL was not issued here,
    /// is malformed, carries a bad signature, or has expired at `now`.
    pub fn verify(&self, url: &str, now: DateTime<Utc>) -> Result<BlobKey, Error> {
        let reject = |reason: &str| -> Error {
            StorageError::UrlRejected {
                reason: reason.to_string(),
            }
            .into()
        };

        let parsed = Url::parse(url).map_err(|_| reject("malformed URL"))?;
        if parsed.origin() != self.base_url.origin() {
            return Err(reject("unknown base URL"));
        }
        let mut segments = parsed
            .path_segments()
            .ok_or_else(|| reject("unknown base URL"))?;
        for expected in self.base_segments() {
            if segments.next() != Some(expected) {
                return Err(reject("unknown base URL"));
            }
        }
        let key = segments
            .map(|segment| percent_decode_str(segment).decode_utf8())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| reject("malformed key"))?
            .join("/");
        if key.is_empty() {
            return Err(reject("malformed key"));
        }

        let mut expires = None;
        let mut sig = None;
        for (name, value) in parsed.query_pairs() {
            match &*name {
                "expires" => expires = value.parse::<i64>().ok(),
                "sig" => sig = blake3::Hash::from_hex(value.as_bytes()).ok(),
                _ => {}
            }
        }
        let expires = expires.ok_or_else(|| reject("missing or invalid expiry"))?;
        let sig = sig.ok_or_else(|| reject("missing or invalid signature"))?;

        // blake3::Hash equality is constant time
        if self.signature(&key, expires) != sig {
            return Err(reject("signature mismatch"));
        }
        if now.timestamp() >= expires {
            return Err(reject("expired"));
        }
        Ok(BlobKey::new(key))
    }
}

#[async_trait]
impl UrlIssuer for SignedUrlIssuer {
    async fn issue(&self, key: &BlobKey, ttl: Duration) -> Result<SignedUrl, Error> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| StorageError::SigningFailed {
            message: format!("ttl out of range: {e}"),
        })?;
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .ok_or_else(|| StorageError::SigningFailed {
                message: "expiry overflows".to_string(),
            })?;
        Ok(self.sign(key, expires_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> SignedUrlIssuer {
        SignedUrlIssuer::new("https://dl.example.com/blobs/", [7u8; 32]).unwrap()
    }

    #[test]
    fn test_sign_and_verify() {
        let issuer = issuer();
        let key = BlobKey::new("packages/acme/ml_model/detector v2/1.0/abc");
        let now = Utc::now();
        let signed = issuer.sign(&key, now + chrono::Duration::seconds(60));

        assert!(signed.url.starts_with("https://dl.example.com/blobs/packages/"));
        assert!(signed.url.contains("detector%20v2"));
        assert_eq!(issuer.verify(&signed.url, now).unwrap(), key);
    }

    #[test]
    fn test_expired_url_rejected() {
        let issuer = issuer();
        let key = BlobKey::new("packages/a");
        let now = Utc::now();
        let signed = issuer.sign(&key, now - chrono::Duration::seconds(1));
        let err = issuer.verify(&signed.url, now).unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::UrlRejected { ref reason }) if reason == "expired"
        ));
    }

    #[test]
    fn test_tampered_url_rejected() {
        let issuer = issuer();
        let now = Utc::now();
        let signed = issuer.sign(
            &BlobKey::new("packages/a"),
            now + chrono::Duration::seconds(60),
        );

        let tampered = signed.url.replace("packages/a", "packages/b");
        assert!(issuer.verify(&tampered, now).is_err());

        let other = SignedUrlIssuer::new("https://dl.example.com/blobs", [8u8; 32]).unwrap();
        assert!(other.verify(&signed.url, now).is_err());
    }

    #[test]
    fn test_awkward_key_roundtrip() {
        let issuer = issuer();
        let now = Utc::now();
        let key = BlobKey::new("packages/ä b/%x?&+=#/v1.0+build");
        let signed = issuer.sign(&key, now + chrono::Duration::seconds(60));

        let parsed = Url::parse(&signed.url).unwrap();
        assert_eq!(parsed.query_pairs().count(), 2);
        assert_eq!(parsed.fragment(), None);
        assert_eq!(issuer.verify(&signed.url, now).unwrap(), key);
    }

    #[test]
    fn test_foreign_base_rejected() {
        let issuer = issuer();
        let now = Utc::now();
        let signed = issuer.sign(&BlobKey::new("packages/a"), now + chrono::Duration::seconds(60));

        let moved = signed.url.replace("/blobs/", "/other/");
        assert!(issuer.verify(&moved, now).is_err());
        let rehosted = signed.url.replace("dl.example.com", "evil.example.com");
        assert!(issuer.verify(&rehosted, now).is_err());
        assert!(issuer.verify("not a url", now).is_err());
    }

    #[test]
    fn test_base_without_path() {
        let issuer = SignedUrlIssuer::new("https://blobs.test", [1u8; 32]).unwrap();
        let now = Utc::now();
        let key = BlobKey::new("packages/a/b");
        let signed = issuer.sign(&key, now + chrono::Duration::seconds(60));

        assert!(signed.url.starts_with("https://blobs.test/packages/a/b?expires="));
        assert_eq!(issuer.verify(&signed.url, now).unwrap(), key);
    }

    #[test]
    fn test_unusable_base_rejected() {
        assert!(SignedUrlIssuer::new("not a url", [0u8; 32]).is_err());
        assert!(SignedUrlIssuer::new("mailto:ops@example.com", [0u8; 32]).is_err());
    }
}
