use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checksum::ChecksumRecord;

/// Attributes copied from an explicit directory marker object (`a/b/`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerStamp {
    pub modified: Option<DateTime<Utc>>,
    pub storage_class: Option<String>,
}

/// A directory as it appears in its parent's listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Final path segment including the trailing `/`; empty for the root.
    pub name: String,
    /// Sum of the sizes of every object below this directory.
    pub size: u64,
    /// Number of objects below this directory.
    pub count: u64,
    /// Present when the bucket holds an explicit marker key for this path.
    pub marker: Option<MarkerStamp>,
}

/// A leaf object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    /// Displayed time. Starts as the listing time; enrichment may replace it
    /// with a timestamp carried in the object's metadata.
    pub modified: Option<DateTime<Utc>>,
    /// Store-intrinsic modification time, used to validate cached checksums.
    pub observed_modified: Option<DateTime<Utc>>,
    /// Identity tag (ETag) from the listing.
    pub etag: String,
    pub storage_class: Option<String>,
    /// `{ALGO}hexdigest` or `{AWS-MD}etag`; empty until enriched.
    pub checksum: Option<String>,
}

impl FileEntry {
    /// Copy a cached or freshly fetched checksum onto this entry.
    pub fn apply(&mut self, record: &ChecksumRecord) {
        self.checksum = record.checksum.clone();
        if record.display_time.is_some() {
            self.modified = record.display_time;
        }
    }
}

/// One row of a directory listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entry {
    Directory(DirEntry),
    File(FileEntry),
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Self::Directory(d) => &d.name,
            Self::File(f) => &f.name,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Self::Directory(d) => d.size,
            Self::File(f) => f.size,
        }
    }

    /// Objects represented by this row: the aggregate for a directory, one
    /// for a file.
    pub fn object_count(&self) -> u64 {
        match self {
            Self::Directory(d) => d.count,
            Self::File(_) => 1,
        }
    }

    /// Aggregate count; `None` for files.
    pub fn count(&self) -> Option<u64> {
        match self {
            Self::Directory(d) => Some(d.count),
            Self::File(_) => None,
        }
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Directory(d) => d.marker.as_ref().and_then(|m| m.modified),
            Self::File(f) => f.modified,
        }
    }

    pub fn storage_class(&self) -> Option<&str> {
        match self {
            Self::Directory(d) => d.marker.as_ref().and_then(|m| m.storage_class.as_deref()),
            Self::File(f) => f.storage_class.as_deref(),
        }
    }

    pub fn checksum(&self) -> Option<&str> {
        match self {
            Self::Directory(_) => None,
            Self::File(f) => f.checksum.as_deref(),
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory(_))
    }

    pub fn as_file(&self) -> Option<&FileEntry> {
        match self {
            Self::File(f) => Some(f),
            Self::Directory(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn file() -> FileEntry {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        FileEntry {
            name: "a.txt".into(),
            size: 10,
            modified: Some(t),
            observed_modified: Some(t),
            etag: "e1".into(),
            storage_class: Some("STANDARD".into()),
            checksum: None,
        }
    }

    #[test]
    fn apply_prefers_record_time() {
        let mut f = file();
        let shown = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        f.apply(&ChecksumRecord {
            checksum: Some("{SHA256}00".into()),
            display_time: Some(shown),
            observed_modified: f.observed_modified,
        });
        assert_eq!(f.checksum.as_deref(), Some("{SHA256}00"));
        assert_eq!(f.modified, Some(shown));
        assert_ne!(f.observed_modified, Some(shown));
    }

    #[test]
    fn apply_without_time_keeps_listing_time() {
        let mut f = file();
        let before = f.modified;
        f.apply(&ChecksumRecord {
            checksum: None,
            display_time: None,
            observed_modified: None,
        });
        assert_eq!(f.modified, before);
        assert!(f.checksum.is_none());
    }

    #[test]
    fn accessors_by_variant() {
        let dir = Entry::Directory(DirEntry {
            name: "docs/".into(),
            size: 30,
            count: 3,
            marker: None,
        });
        assert!(dir.is_directory());
        assert_eq!(dir.count(), Some(3));
        assert_eq!(dir.object_count(), 3);
        assert!(dir.checksum().is_none());
        assert!(dir.modified().is_none());

        let f = Entry::File(file());
        assert_eq!(f.count(), None);
        assert_eq!(f.object_count(), 1);
        assert_eq!(f.storage_class(), Some("STANDARD"));
        assert_eq!(f.as_file().unwrap().etag, "e1");
    }
}
