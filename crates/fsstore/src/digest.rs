//! ContentId: a 256-bit content digest rendered as 64 lowercase hex chars.
//!
//! The digest is the object's name. Two stores configured with different
//! algorithms produce different ids for the same bytes, so the algorithm is a
//! store-wide setting rather than a per-object one.

use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use thiserror::Error;

use crate::error::StoreError;

/// Length of a hex-rendered 256-bit digest.
pub const DIGEST_HEX_LEN: usize = 64;

const READ_BUF_SIZE: usize = 64 * 1024;

/// Hash function used to derive content ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// SHA-256. Matches stores written by older SHA-256 based tooling.
    #[default]
    Sha256,
    /// BLAKE3 with its full 256-bit output.
    Blake3,
}

impl DigestAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Blake3 => "blake3",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(DigestAlgorithm::Sha256),
            "blake3" => Ok(DigestAlgorithm::Blake3),
            other => Err(format!("unknown digest algorithm: {other}")),
        }
    }
}

/// Errors that can occur when parsing a content id supplied from outside.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContentIdError {
    #[error("content id is empty")]
    Empty,

    #[error("invalid hex character in content id")]
    InvalidHex,
}

/// A content identifier: lowercase hex digest of an object's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Hash data and return its content id.
    pub fn from_data(algorithm: DigestAlgorithm, data: &[u8]) -> Self {
        let mut hasher = ContentHasher::new(algorithm);
        hasher.update(data);
        hasher.finish()
    }

    /// Parse an id from a string, normalising to lowercase.
    pub fn from_str_checked(s: &str) -> Result<Self, ContentIdError> {
        if s.is_empty() {
            return Err(ContentIdError::Empty);
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ContentIdError::InvalidHex);
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Split into the shard directory segment and the remainder.
    ///
    /// A shard length at or beyond the id length leaves the remainder empty.
    pub fn split_shard(&self, shard_len: usize) -> (&str, &str) {
        self.0.split_at(shard_len.min(self.0.len()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentId {
    type Err = ContentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_checked(s)
    }
}

impl AsRef<str> for ContentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Incremental hasher producing a [`ContentId`].
pub enum ContentHasher {
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl ContentHasher {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Sha256 => ContentHasher::Sha256(Sha256::new()),
            DigestAlgorithm::Blake3 => ContentHasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            ContentHasher::Sha256(h) => h.update(data),
            ContentHasher::Blake3(h) => {
                h.update(data);
            }
        }
    }

    pub fn finish(self) -> ContentId {
        let hex = match self {
            ContentHasher::Sha256(h) => hex::encode(h.finalize()),
            ContentHasher::Blake3(h) => hex::encode(h.finalize().as_bytes()),
        };
        ContentId(hex)
    }
}

/// Digest a byte slice. Total: every input, including empty, has an id.
pub fn digest(algorithm: DigestAlgorithm, data: &[u8]) -> ContentId {
    ContentId::from_data(algorithm, data)
}

/// Digest everything a reader yields.
///
/// Fails with [`StoreError::DigestionFailed`] if the reader does.
pub fn digest_reader<R: Read>(algorithm: DigestAlgorithm, mut reader: R) -> Result<ContentId, StoreError> {
    let mut hasher = ContentHasher::new(algorithm);
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(StoreError::DigestionFailed { source: e }),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vectors() {
        assert_eq!(
            digest(DigestAlgorithm::Sha256, b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            digest(DigestAlgorithm::Sha256, b"abc").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_blake3_known_vector() {
        assert_eq!(
            digest(DigestAlgorithm::Blake3, b"").as_str(),
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }

    #[test]
    fn test_digest_is_64_lowercase_hex() {
        for algorithm in [DigestAlgorithm::Sha256, DigestAlgorithm::Blake3] {
            let id = digest(algorithm, b"Hello, World!");
            assert_eq!(id.as_str().len(), DIGEST_HEX_LEN);
            assert!(id
                .as_str()
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        }
    }

    #[test]
    fn test_digest_is_deterministic() {
        let a = digest(DigestAlgorithm::Sha256, b"test data");
        let b = digest(DigestAlgorithm::Sha256, b"test data");
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_input_different_digest() {
        let a = digest(DigestAlgorithm::Sha256, b"data a");
        let b = digest(DigestAlgorithm::Sha256, b"data b");
        assert_ne!(a, b);
    }

    #[test]
    fn test_algorithms_disagree() {
        let a = digest(DigestAlgorithm::Sha256, b"same bytes");
        let b = digest(DigestAlgorithm::Blake3, b"same bytes");
        assert_ne!(a, b);
    }

    #[test]
    fn test_digest_reader_matches_slice() {
        let data = vec![7u8; READ_BUF_SIZE * 3 + 17];
        let from_reader = digest_reader(DigestAlgorithm::Sha256, data.as_slice()).unwrap();
        assert_eq!(from_reader, digest(DigestAlgorithm::Sha256, &data));
    }

    #[test]
    fn test_digest_reader_failure() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("disk on fire"))
            }
        }

        let err = digest_reader(DigestAlgorithm::Sha256, Broken).unwrap_err();
        assert!(matches!(err, StoreError::DigestionFailed { .. }));
    }

    #[test]
    fn test_split_shard() {
        let id: ContentId = "aabbcc".parse().unwrap();
        assert_eq!(id.split_shard(2), ("aa", "bbcc"));
        assert_eq!(id.split_shard(0), ("", "aabbcc"));
        assert_eq!(id.split_shard(10), ("aabbcc", ""));
    }

    #[test]
    fn test_from_str_normalises_case() {
        let id: ContentId = "AbCd01".parse().unwrap();
        assert_eq!(id.as_str(), "abcd01");
    }

    #[test]
    fn test_from_str_rejects_bad_input() {
        assert_eq!("".parse::<ContentId>(), Err(ContentIdError::Empty));
        assert_eq!("zz11".parse::<ContentId>(), Err(ContentIdError::InvalidHex));
        assert_eq!(".tmp".parse::<ContentId>(), Err(ContentIdError::InvalidHex));
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!("SHA256".parse::<DigestAlgorithm>(), Ok(DigestAlgorithm::Sha256));
        assert_eq!("blake3".parse::<DigestAlgorithm>(), Ok(DigestAlgorithm::Blake3));
        assert!("md5".parse::<DigestAlgorithm>().is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let id = digest(DigestAlgorithm::Sha256, b"serde test");
        let json = serde_json::to_string(&id).unwrap();
        let restored: ContentId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }
}
