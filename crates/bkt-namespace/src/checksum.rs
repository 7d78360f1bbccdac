use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::sync::Cache;

/// Cache key: an object's full path plus its identity tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChecksumKey {
    pub path: String,
    pub etag: String,
}

impl ChecksumKey {
    pub fn new(path: impl Into<String>, etag: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            etag: etag.into(),
        }
    }
}

/// What one metadata fetch learned about an object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChecksumRecord {
    /// Rendered checksum; `None` when the backend offered neither a digest
    /// nor an identity tag.
    pub checksum: Option<String>,
    /// Display time from the object's `date` metadata; `None` keeps the
    /// listing time.
    pub display_time: Option<DateTime<Utc>>,
    /// Store-intrinsic modification time at fetch, the validity key.
    pub observed_modified: Option<DateTime<Utc>>,
}

/// Snapshot-independent cache of fetched checksums.
///
/// Survives namespace rebuilds. Entries are only returned while the
/// object's modification time still matches the one observed at fetch;
/// capacity and idle expiry bound its growth.
pub struct ChecksumCache {
    entries: Cache<ChecksumKey, ChecksumRecord>,
}

impl ChecksumCache {
    pub fn new(capacity: u64, idle: Option<Duration>) -> Self {
        let mut builder = Cache::builder().max_capacity(capacity);
        if let Some(idle) = idle {
            builder = builder.time_to_idle(idle);
        }
        Self {
            entries: builder.build(),
        }
    }

    /// Cached record for `(path, etag)`, if it is still valid for an object
    /// last modified at `observed`.
    pub fn lookup(
        &self,
        path: &str,
        etag: &str,
        observed: Option<DateTime<Utc>>,
    ) -> Option<ChecksumRecord> {
        let record = self.entries.get(&ChecksumKey::new(path, etag))?;
        if record.observed_modified == observed {
            tracing::debug!(path, etag, "checksum cache hit");
            Some(record)
        } else {
            tracing::debug!(path, etag, "checksum cache entry stale");
            None
        }
    }

    pub fn insert(&self, path: &str, etag: &str, record: ChecksumRecord) {
        self.entries.insert(ChecksumKey::new(path, etag), record);
    }

    /// Approximate number of cached records.
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ChecksumCache {
    fn default() -> Self {
        Self::new(1_000_000, None)
    }
}

impl std::fmt::Debug for ChecksumCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumCache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}
