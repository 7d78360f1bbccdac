use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Listing records
// ---------------------------------------------------------------------------

/// One key as reported by a bucket listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    /// Full object key; keys ending in `/` are directory markers.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Store-intrinsic modification time.
    pub last_modified: Option<DateTime<Utc>>,
    /// Identity tag (ETag), unquoted.
    pub etag: String,
    /// Storage class label, when the backend reports one.
    pub storage_class: Option<String>,
}

impl ObjectSummary {
    /// Returns `true` if this key is an explicit directory marker.
    pub fn is_marker(&self) -> bool {
        self.key.ends_with('/')
    }
}

/// One page of a paginated bucket listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects: Vec<ObjectSummary>,
    /// Continuation token for the next page; `None` on the last page.
    pub next_token: Option<String>,
}

// ---------------------------------------------------------------------------
// Checksums
// ---------------------------------------------------------------------------

/// Checksum algorithms a backend may attach to an object.
///
/// Declared in preference order: the derived `Ord` ranks `Sha256` first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChecksumAlgorithm {
    Sha256,
    Sha1,
    Crc32c,
    Crc32,
}

impl ChecksumAlgorithm {
    /// Label used when rendering a checksum, e.g. `SHA256`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sha256 => "SHA256",
            Self::Sha1 => "SHA1",
            Self::Crc32c => "CRC32C",
            Self::Crc32 => "CRC32",
        }
    }
}

impl std::fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Metadata and bodies
// ---------------------------------------------------------------------------

/// Result of a metadata (HEAD) request for a single key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectHead {
    pub size: u64,
    /// Store-intrinsic modification time.
    pub last_modified: Option<DateTime<Utc>>,
    /// Identity tag (ETag), unquoted.
    pub etag: String,
    /// Raw digests keyed by algorithm.
    pub checksums: BTreeMap<ChecksumAlgorithm, Vec<u8>>,
    /// User-defined metadata, keys lower-cased.
    pub metadata: HashMap<String, String>,
}

impl ObjectHead {
    /// The strongest checksum available, if any.
    pub fn preferred_checksum(&self) -> Option<(ChecksumAlgorithm, &[u8])> {
        self.checksums
            .iter()
            .next()
            .map(|(algo, digest)| (*algo, digest.as_slice()))
    }
}

/// Full object content plus the headers needed to serve it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectBody {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Strip the surrounding double quotes backends put on ETags.
pub fn unquote_etag(raw: &str) -> &str {
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferred_checksum_follows_algorithm_rank() {
        let mut head = ObjectHead::default();
        head.checksums.insert(ChecksumAlgorithm::Crc32, vec![1]);
        head.checksums.insert(ChecksumAlgorithm::Sha1, vec![2]);
        head.checksums.insert(ChecksumAlgorithm::Crc32c, vec![3]);
        let (algo, digest) = head.preferred_checksum().unwrap();
        assert_eq!(algo, ChecksumAlgorithm::Sha1);
        assert_eq!(digest, &[2]);

        head.checksums.insert(ChecksumAlgorithm::Sha256, vec![4]);
        assert_eq!(head.preferred_checksum().unwrap().0, ChecksumAlgorithm::Sha256);
    }

    #[test]
    fn no_checksum_when_empty() {
        assert!(ObjectHead::default().preferred_checksum().is_none());
    }

    #[test]
    fn unquote_strips_only_matching_quotes() {
        assert_eq!(unquote_etag("\"abc\""), "abc");
        assert_eq!(unquote_etag("abc"), "abc");
        assert_eq!(unquote_etag("\"abc"), "\"abc");
    }

    #[test]
    fn marker_detection() {
        let mut s = ObjectSummary {
            key: "a/b/".into(),
            size: 0,
            last_modified: None,
            etag: String::new(),
            storage_class: None,
        };
        assert!(s.is_marker());
        s.key = "a/b".into();
        assert!(!s.is_marker());
    }

    #[test]
    fn algorithm_labels() {
        assert_eq!(ChecksumAlgorithm::Crc32c.to_string(), "CRC32C");
        assert_eq!(ChecksumAlgorithm::Sha256.label(), "SHA256");
    }
}
