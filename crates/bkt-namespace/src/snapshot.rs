//! TTL-gated holder of the current [`Namespace`].
//!
//! Readers clone an `Arc` out of a briefly held read lock and never wait
//! on a rebuild while the snapshot is fresh. A stale snapshot sends callers
//! through one exclusive rebuild lock; whoever gets it second re-checks
//! freshness first, so a burst of stale readers costs a single listing.
//! Rebuilds run on their own task: a caller that gives up waiting does not
//! abort the listing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use bkt_store::ObjectStore;
use tokio::sync::Mutex;

use crate::builder::NamespaceBuilder;
use crate::config::NamespaceConfig;
use crate::error::{NamespaceError, NamespaceResult};
use crate::namespace::Namespace;

struct Published {
    namespace: Arc<Namespace>,
    installed: Instant,
}

#[derive(Default)]
struct State {
    published: Option<Published>,
    /// Set by [`SnapshotCache::invalidate`]; cleared by a build that
    /// started after it.
    invalidated_at: Option<Instant>,
    last_error: Option<String>,
    last_failure: Option<Instant>,
}

/// Health summary of the snapshot cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotStatus {
    /// Number of snapshots installed since startup.
    pub generation: u64,
    pub age: Option<Duration>,
    pub directories: usize,
    pub objects: u64,
    pub bytes: u64,
    pub last_error: Option<String>,
}

/// Everything a detached rebuild task needs.
struct Shared {
    store: Arc<dyn ObjectStore>,
    ttl: Duration,
    retry_backoff: Duration,
    state: RwLock<State>,
    generation: AtomicU64,
}

/// Holds the current namespace snapshot and rebuilds it when stale.
pub struct SnapshotCache {
    shared: Arc<Shared>,
    rebuild: Arc<Mutex<()>>,
}

impl SnapshotCache {
    pub fn new(store: Arc<dyn ObjectStore>, config: &NamespaceConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                ttl: config.ttl(),
                retry_backoff: config.retry_backoff(),
                state: RwLock::new(State::default()),
                generation: AtomicU64::new(0),
            }),
            rebuild: Arc::new(Mutex::new(())),
        }
    }

    /// The current snapshot, rebuilding first if it is older than the TTL.
    ///
    /// When a rebuild fails the previous snapshot keeps serving; only if no
    /// build has ever succeeded is the failure returned. Dropping the
    /// returned future leaves a started rebuild running to completion.
    pub async fn current(&self) -> NamespaceResult<Arc<Namespace>> {
        if let Some(ns) = self.shared.usable(Instant::now()) {
            return Ok(ns);
        }

        let shared = Arc::clone(&self.shared);
        let rebuild = Arc::clone(&self.rebuild);
        let task = tokio::spawn(async move {
            let _guard = rebuild.lock_owned().await;
            shared.refresh().await
        });
        task.await
            .map_err(|e| NamespaceError::RebuildTask(e.to_string()))?
    }

    /// Force the next access to rebuild, e.g. after a write.
    pub fn invalidate(&self) {
        self.shared.state.write().expect("lock poisoned").invalidated_at = Some(Instant::now());
    }

    /// Message of the most recent failed build, cleared by the next success.
    pub fn last_error(&self) -> Option<String> {
        self.shared.state.read().expect("lock poisoned").last_error.clone()
    }

    /// The installed snapshot regardless of age.
    pub fn peek(&self) -> Option<Arc<Namespace>> {
        self.shared
            .state
            .read()
            .expect("lock poisoned")
            .published
            .as_ref()
            .map(|p| Arc::clone(&p.namespace))
    }

    pub fn status(&self) -> SnapshotStatus {
        let state = self.shared.state.read().expect("lock poisoned");
        let (age, directories, (bytes, objects)) = match &state.published {
            Some(p) => (
                Some(p.installed.elapsed()),
                p.namespace.directory_count(),
                p.namespace.totals(),
            ),
            None => (None, 0, (0, 0)),
        };
        SnapshotStatus {
            generation: self.shared.generation.load(Ordering::SeqCst),
            age,
            directories,
            objects,
            bytes,
            last_error: state.last_error.clone(),
        }
    }
}

impl Shared {
    /// Rebuild unless someone else already did. Must run under the rebuild
    /// lock.
    async fn refresh(&self) -> NamespaceResult<Arc<Namespace>> {
        let started = Instant::now();
        if let Some(ns) = self.usable(started) {
            tracing::debug!("snapshot refreshed while waiting");
            return Ok(ns);
        }
        if let Some(last_error) = self.recent_failure(started) {
            return Err(NamespaceError::NoSnapshot { last_error });
        }

        match NamespaceBuilder::build(self.store.as_ref()).await {
            Ok(namespace) => Ok(self.publish(namespace, started)),
            Err(e) => {
                tracing::warn!(error = %e, "namespace rebuild failed; keeping previous snapshot");
                let mut state = self.state.write().expect("lock poisoned");
                state.last_error = Some(e.to_string());
                state.last_failure = Some(Instant::now());
                match &state.published {
                    Some(p) => Ok(Arc::clone(&p.namespace)),
                    None => Err(NamespaceError::NoSnapshot {
                        last_error: e.to_string(),
                    }),
                }
            }
        }
    }

    /// Snapshot to hand out without rebuilding, if any.
    fn usable(&self, now: Instant) -> Option<Arc<Namespace>> {
        let state = self.state.read().expect("lock poisoned");
        let published = state.published.as_ref()?;
        let stale = state.invalidated_at.is_some()
            || now.saturating_duration_since(published.installed) > self.ttl;
        let backing_off = state
            .last_failure
            .is_some_and(|at| now.saturating_duration_since(at) < self.retry_backoff);
        if stale && !backing_off {
            None
        } else {
            Some(Arc::clone(&published.namespace))
        }
    }

    /// Error of a failure still inside the retry backoff window.
    fn recent_failure(&self, now: Instant) -> Option<String> {
        let state = self.state.read().expect("lock poisoned");
        let at = state.last_failure?;
        if now.saturating_duration_since(at) < self.retry_backoff {
            state.last_error.clone()
        } else {
            None
        }
    }

    fn publish(&self, namespace: Namespace, started: Instant) -> Arc<Namespace> {
        let namespace = Arc::new(namespace);
        let (bytes, objects) = namespace.totals();
        {
            let mut state = self.state.write().expect("lock poisoned");
            state.published = Some(Published {
                namespace: Arc::clone(&namespace),
                installed: Instant::now(),
            });
            if state.invalidated_at.is_some_and(|at| at <= started) {
                state.invalidated_at = None;
            }
            state.last_error = None;
            state.last_failure = None;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(
            generation,
            directories = namespace.directory_count(),
            objects,
            bytes,
            elapsed_ms = namespace.build_time().as_millis() as u64,
            "namespace snapshot installed"
        );
        namespace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bkt_store::{InMemoryObjectStore, ListPage, ObjectBody, ObjectHead, StoreResult};
    use bytes::Bytes;

    use crate::entry::Entry;

    fn config(ttl_ms: u64) -> NamespaceConfig {
        NamespaceConfig {
            ttl_ms,
            retry_backoff_ms: 0,
            ..Default::default()
        }
    }

    /// Sleeps before every listing page.
    struct SlowListing {
        inner: InMemoryObjectStore,
        per_page: Duration,
    }

    #[async_trait]
    impl ObjectStore for SlowListing {
        async fn list_page(&self, continuation: Option<&str>) -> StoreResult<ListPage> {
            tokio::time::sleep(self.per_page).await;
            self.inner.list_page(continuation).await
        }

        async fn head(&self, key: &str) -> StoreResult<ObjectHead> {
            self.inner.head(key).await
        }

        async fn get(&self, key: &str) -> StoreResult<ObjectBody> {
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, data: Bytes, content_type: Option<&str>) -> StoreResult<()> {
            self.inner.put(key, data, content_type).await
        }

        async fn delete(&self, key: &str) -> StoreResult<()> {
            self.inner.delete(key).await
        }
    }

    fn cache_over(store: Arc<InMemoryObjectStore>, ttl_ms: u64) -> SnapshotCache {
        SnapshotCache::new(store, &config(ttl_ms))
    }

    // -----------------------------------------------------------------------
    // Freshness
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn first_access_builds_then_reuses() {
        let store = Arc::new(InMemoryObjectStore::new());
        store.insert_bytes("a/b", "x");
        let cache = cache_over(store.clone(), 60_000);

        let first = cache.current().await.unwrap();
        let second = cache.current().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.list_calls(), 1);
        assert_eq!(cache.status().generation, 1);
    }

    #[tokio::test]
    async fn stale_snapshot_is_rebuilt() {
        let store = Arc::new(InMemoryObjectStore::new());
        store.insert_bytes("one", "x");
        let cache = cache_over(store.clone(), 1);

        let first = cache.current().await.unwrap();
        store.insert_bytes("two", "y");
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = cache.current().await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.is_file("two"));
        assert!(!first.is_file("two"));
    }

    #[tokio::test]
    async fn invalidate_forces_rebuild() {
        let store = Arc::new(InMemoryObjectStore::new());
        let cache = cache_over(store.clone(), 60_000);
        cache.current().await.unwrap();
        store.insert_bytes("new", "x");
        cache.invalidate();
        assert!(cache.current().await.unwrap().is_file("new"));
        assert_eq!(store.list_calls(), 2);
        // Cleared after a successful rebuild.
        cache.current().await.unwrap();
        assert_eq!(store.list_calls(), 2);
    }

    // -----------------------------------------------------------------------
    // Failure handling
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn failed_rebuild_keeps_previous_snapshot() {
        let store = Arc::new(InMemoryObjectStore::with_page_size(1));
        store.insert_bytes("a", "x");
        store.insert_bytes("b", "x");
        let cache = cache_over(store.clone(), 1);
        let good = cache.current().await.unwrap();

        store.insert_bytes("c", "x");
        store.fail_listing_after(Some(1));
        tokio::time::sleep(Duration::from_millis(5)).await;
        let served = cache.current().await.unwrap();
        assert!(Arc::ptr_eq(&good, &served));
        assert!(!served.is_file("c"));
        assert!(cache.last_error().unwrap().contains("injected"));

        store.fail_listing_after(None);
        let recovered = cache.current().await.unwrap();
        assert!(recovered.is_file("c"));
        assert!(cache.last_error().is_none());
    }

    #[tokio::test]
    async fn first_build_failure_is_reported() {
        let store = Arc::new(InMemoryObjectStore::new());
        store.fail_listing_after(Some(0));
        let cache = cache_over(store, 60_000);
        let err = cache.current().await.unwrap_err();
        assert!(matches!(err, NamespaceError::NoSnapshot { .. }));
        assert!(cache.peek().is_none());
        assert!(cache.status().last_error.is_some());
    }

    #[tokio::test]
    async fn backoff_applies_before_first_success() {
        let store = Arc::new(InMemoryObjectStore::new());
        store.fail_listing_after(Some(0));
        let cache = SnapshotCache::new(
            store.clone(),
            &NamespaceConfig {
                retry_backoff_ms: 60_000,
                ..Default::default()
            },
        );
        assert!(cache.current().await.is_err());
        assert!(cache.current().await.is_err());
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn backoff_spaces_out_failed_rebuilds() {
        let store = Arc::new(InMemoryObjectStore::new());
        store.insert_bytes("a", "x");
        let cache = SnapshotCache::new(
            store.clone(),
            &NamespaceConfig {
                ttl_ms: 1,
                retry_backoff_ms: 60_000,
                ..Default::default()
            },
        );
        cache.current().await.unwrap();
        store.fail_listing_after(Some(0));
        tokio::time::sleep(Duration::from_millis(5)).await;

        cache.current().await.unwrap();
        let calls = store.list_calls();
        for _ in 0..5 {
            cache.current().await.unwrap();
        }
        assert_eq!(store.list_calls(), calls);
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_stale_readers_share_one_rebuild() {
        let store = Arc::new(InMemoryObjectStore::new());
        for i in 0..50 {
            store.insert_bytes(format!("d{}/f{i}", i % 5), "x");
        }
        let cache = Arc::new(cache_over(store.clone(), 60_000));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.current().await.unwrap() }));
        }
        let mut snapshots = Vec::new();
        for h in handles {
            snapshots.push(h.await.unwrap());
        }
        assert_eq!(store.list_calls(), 1);
        assert!(snapshots.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test]
    async fn abandoned_callers_do_not_cancel_rebuild() {
        let inner = InMemoryObjectStore::with_page_size(1);
        for i in 0..5 {
            inner.insert_bytes(format!("k{i}"), "x");
        }
        let slow = Arc::new(SlowListing {
            inner,
            per_page: Duration::from_millis(20),
        });
        let cache = SnapshotCache::new(slow.clone(), &config(60_000));

        for _ in 0..4 {
            let attempt = tokio::time::timeout(Duration::from_millis(60), cache.current()).await;
            assert!(attempt.is_err());
            if cache.peek().is_some() {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        let installed = cache.peek().expect("snapshot installed");
        assert_eq!(installed.totals().1, 5);
        assert_eq!(cache.status().generation, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_observe_half_built_tree() {
        let store = Arc::new(InMemoryObjectStore::with_page_size(7));
        for i in 0..200 {
            store.insert_bytes(format!("r{}/s{}/f{i}", i % 4, i % 9), vec![0u8; i % 13]);
        }
        let cache = Arc::new(cache_over(store.clone(), 0));

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for i in 200..260 {
                    store.insert_bytes(format!("r{}/new{i}", i % 4), vec![1u8; i % 7]);
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            readers.push(tokio::spawn(async move {
                for _ in 0..25 {
                    let ns = cache.current().await.unwrap();
                    for dir in ns.directories() {
                        let size: u64 = dir.children.iter().map(Entry::size).sum();
                        let count: u64 = dir.children.iter().map(Entry::object_count).sum();
                        assert_eq!(dir.size, size);
                        assert_eq!(dir.count, count);
                    }
                }
            }));
        }
        writer.await.unwrap();
        for r in readers {
            r.await.unwrap();
        }
        assert!(cache.status().generation > 1);
    }
}
