use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::{StoreError, StoreResult};
use crate::object::{ChecksumAlgorithm, ListPage, ObjectBody, ObjectHead, ObjectSummary};
use crate::traits::ObjectStore;

/// Default number of keys per listing page, matching S3.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// An object as held by [`InMemoryObjectStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryObject {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub storage_class: Option<String>,
    pub metadata: HashMap<String, String>,
    /// Attach a SHA-256 digest to HEAD responses.
    pub with_sha256: bool,
}

impl MemoryObject {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            content_type: None,
            last_modified: Utc::now(),
            storage_class: Some("STANDARD".into()),
            metadata: HashMap::new(),
            with_sha256: true,
        }
    }

    pub fn modified_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_modified = at;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Drop the explicit checksum so readers fall back to the ETag.
    pub fn without_checksum(mut self) -> Self {
        self.with_sha256 = false;
        self
    }
}

#[derive(Clone, Debug)]
struct Slot {
    object: MemoryObject,
    etag: String,
}

#[derive(Default)]
struct Faults {
    /// Listing fails once this many pages have been served in one pass.
    list_fails_after: Option<usize>,
    head_fails: HashSet<String>,
    read_only: bool,
}

/// In-memory, BTreeMap-based object store.
///
/// Intended for tests and demos. Listing is paginated exactly like a real
/// bucket, and faults can be injected into listing and HEAD calls.
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<String, Slot>>,
    faults: RwLock<Faults>,
    page_size: usize,
    version: AtomicU64,
    head_calls: AtomicU64,
    list_calls: AtomicU64,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create a store that serves at most `page_size` keys per listing page.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            faults: RwLock::new(Faults::default()),
            page_size: page_size.max(1),
            version: AtomicU64::new(0),
            head_calls: AtomicU64::new(0),
            list_calls: AtomicU64::new(0),
        }
    }

    /// Insert or replace an object. Every write assigns a fresh ETag.
    pub fn insert(&self, key: impl Into<String>, object: MemoryObject) {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let etag = format!("{version:016x}");
        self.objects
            .write()
            .expect("lock poisoned")
            .insert(key.into(), Slot { object, etag });
    }

    /// Insert a key with the given content and default attributes.
    pub fn insert_bytes(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.insert(key, MemoryObject::new(data));
    }

    /// Current ETag for a key.
    pub fn etag(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .expect("lock poisoned")
            .get(key)
            .map(|slot| slot.etag.clone())
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Make every listing pass fail after `pages` pages; `None` clears it.
    pub fn fail_listing_after(&self, pages: Option<usize>) {
        self.faults.write().expect("lock poisoned").list_fails_after = pages;
    }

    /// Make HEAD requests for `key` fail with a backend error.
    pub fn fail_head(&self, key: impl Into<String>) {
        self.faults
            .write()
            .expect("lock poisoned")
            .head_fails
            .insert(key.into());
    }

    /// Reject `put` and `delete`.
    pub fn set_read_only(&self, read_only: bool) {
        self.faults.write().expect("lock poisoned").read_only = read_only;
    }

    /// Total HEAD requests served so far, including failed ones.
    pub fn head_calls(&self) -> u64 {
        self.head_calls.load(Ordering::SeqCst)
    }

    /// Total listing pages requested so far, including failed ones.
    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn page_index(&self, continuation: Option<&str>) -> usize {
        // Tokens are the last key of the previous page; recover the page
        // number so fault injection can count pages within one pass.
        match continuation {
            None => 0,
            Some(token) => {
                let map = self.objects.read().expect("lock poisoned");
                let served = map
                    .range::<str, _>((Bound::Unbounded, Bound::Included(token)))
                    .count();
                served.div_ceil(self.page_size)
            }
        }
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn list_page(&self, continuation: Option<&str>) -> StoreResult<ListPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let page = self.page_index(continuation);
        if let Some(limit) = self.faults.read().expect("lock poisoned").list_fails_after {
            if page >= limit {
                return Err(StoreError::backend(format!(
                    "injected listing failure on page {page}"
                )));
            }
        }

        let map = self.objects.read().expect("lock poisoned");
        let lower = match continuation {
            Some(token) => Bound::Excluded(token),
            None => Bound::Unbounded,
        };
        let objects: Vec<ObjectSummary> = map
            .range::<str, _>((lower, Bound::Unbounded))
            .take(self.page_size)
            .map(|(key, slot)| ObjectSummary {
                key: key.clone(),
                size: slot.object.data.len() as u64,
                last_modified: Some(slot.object.last_modified),
                etag: slot.etag.clone(),
                storage_class: slot.object.storage_class.clone(),
            })
            .collect();

        let next_token = match objects.last() {
            Some(last)
                if map
                    .range::<str, _>((Bound::Excluded(last.key.as_str()), Bound::Unbounded))
                    .next()
                    .is_some() =>
            {
                Some(last.key.clone())
            }
            _ => None,
        };
        Ok(ListPage { objects, next_token })
    }

    async fn head(&self, key: &str) -> StoreResult<ObjectHead> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        if self.faults.read().expect("lock poisoned").head_fails.contains(key) {
            return Err(StoreError::backend(format!("injected HEAD failure for {key}")));
        }
        let map = self.objects.read().expect("lock poisoned");
        let slot = map
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        let mut head = ObjectHead {
            size: slot.object.data.len() as u64,
            last_modified: Some(slot.object.last_modified),
            etag: slot.etag.clone(),
            metadata: slot.object.metadata.clone(),
            ..Default::default()
        };
        if slot.object.with_sha256 {
            let digest = Sha256::digest(&slot.object.data);
            head.checksums.insert(ChecksumAlgorithm::Sha256, digest.to_vec());
        }
        Ok(head)
    }

    async fn get(&self, key: &str) -> StoreResult<ObjectBody> {
        let map = self.objects.read().expect("lock poisoned");
        let slot = map
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        Ok(ObjectBody {
            data: slot.object.data.clone(),
            content_type: slot.object.content_type.clone(),
            last_modified: Some(slot.object.last_modified),
        })
    }

    async fn put(&self, key: &str, data: Bytes, content_type: Option<&str>) -> StoreResult<()> {
        if self.faults.read().expect("lock poisoned").read_only {
            return Err(StoreError::ReadOnly);
        }
        let mut object = MemoryObject::new(data);
        object.content_type = content_type.map(str::to_string);
        self.insert(key, object);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        if self.faults.read().expect("lock poisoned").read_only {
            return Err(StoreError::ReadOnly);
        }
        self.objects.write().expect("lock poisoned").remove(key);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .field("page_size", &self.page_size)
            .finish()
    }
}
