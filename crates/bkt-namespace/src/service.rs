use std::sync::Arc;

use bkt_store::ObjectStore;

use crate::checksum::ChecksumCache;
use crate::config::NamespaceConfig;
use crate::enrich::Enricher;
use crate::entry::Entry;
use crate::error::{NamespaceError, NamespaceResult};
use crate::namespace::Namespace;
use crate::snapshot::{SnapshotCache, SnapshotStatus};

/// One enriched directory listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Listing {
    /// Directory path with trailing `/`; `""` for the root.
    pub path: String,
    pub entries: Vec<Entry>,
}

/// Path queries and listings over an always-fresh snapshot.
///
/// Every call goes through [`SnapshotCache::current`] first, so answers
/// reflect a snapshot no older than the configured TTL.
pub struct BucketNamespace {
    snapshots: SnapshotCache,
    enricher: Enricher,
}

impl BucketNamespace {
    pub fn new(store: Arc<dyn ObjectStore>, config: &NamespaceConfig) -> Self {
        let cache = Arc::new(ChecksumCache::new(
            config.checksum_cache_capacity,
            config.checksum_cache_idle(),
        ));
        Self {
            snapshots: SnapshotCache::new(Arc::clone(&store), config),
            enricher: Enricher::new(store, cache, config.enrich_concurrency, config.head_timeout()),
        }
    }

    pub fn snapshots(&self) -> &SnapshotCache {
        &self.snapshots
    }

    pub fn enricher(&self) -> &Enricher {
        &self.enricher
    }

    pub async fn current(&self) -> NamespaceResult<Arc<Namespace>> {
        self.snapshots.current().await
    }

    pub async fn is_directory(&self, path: &str) -> NamespaceResult<bool> {
        Ok(self.current().await?.is_directory(path))
    }

    pub async fn is_file(&self, path: &str) -> NamespaceResult<bool> {
        Ok(self.current().await?.is_file(path))
    }

    /// The entry at `path`, as it would appear in its parent's listing.
    pub async fn resolve(&self, path: &str) -> NamespaceResult<Entry> {
        let ns = self.current().await?;
        ns.resolve(path)
            .map(|r| r.to_entry())
            .ok_or_else(|| NamespaceError::NotFound(path.to_string()))
    }

    /// Immediate children of a directory, checksums filled in.
    pub async fn list(&self, path: &str) -> NamespaceResult<Listing> {
        let ns = self.current().await?;
        let dir = ns
            .directory(path)
            .ok_or_else(|| NamespaceError::NotFound(path.to_string()))?;
        Ok(Listing {
            path: dir.path.clone(),
            entries: self.enricher.enrich(&dir.path, &dir.children).await,
        })
    }

    /// The directory and every descendant directory in pre-order, each
    /// listing enriched.
    pub async fn list_recursive(&self, path: &str) -> NamespaceResult<Vec<Listing>> {
        let ns = self.current().await?;
        let dirs = ns.walk(path);
        if dirs.is_empty() {
            return Err(NamespaceError::NotFound(path.to_string()));
        }
        let mut out = Vec::with_capacity(dirs.len());
        for dir in dirs {
            out.push(Listing {
                path: dir.path.clone(),
                entries: self.enricher.enrich(&dir.path, &dir.children).await,
            });
        }
        Ok(out)
    }

    /// Mark the snapshot stale after a write through this process.
    pub fn invalidate(&self) {
        self.snapshots.invalidate();
    }

    pub fn status(&self) -> SnapshotStatus {
        self.snapshots.status()
    }
}
