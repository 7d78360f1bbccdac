//! Fills in checksums for a directory's children before it is rendered.
//!
//! Each listing gets its own semaphore, so at most `concurrency` metadata
//! calls are outstanding per listing. Fetches run as detached tasks: if the
//! caller goes away they still finish and populate the cache.

use std::sync::Arc;
use std::time::Duration;

use bkt_store::{ObjectHead, ObjectStore, StoreError, StoreResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use tokio::sync::Semaphore;

use crate::checksum::{ChecksumCache, ChecksumRecord};
use crate::entry::Entry;

/// Custom metadata key holding an explicit display timestamp.
pub const METADATA_DATE_KEY: &str = "date";

/// Layout of [`METADATA_DATE_KEY`] values, always UTC.
pub const METADATA_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Bounded-concurrency checksum fetcher backed by a [`ChecksumCache`].
#[derive(Clone)]
pub struct Enricher {
    store: Arc<dyn ObjectStore>,
    cache: Arc<ChecksumCache>,
    concurrency: usize,
    head_timeout: Duration,
}

impl Enricher {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        cache: Arc<ChecksumCache>,
        concurrency: usize,
        head_timeout: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            concurrency: concurrency.max(1),
            head_timeout,
        }
    }

    pub fn cache(&self) -> &ChecksumCache {
        &self.cache
    }

    /// Return copies of `children` (the listing of `dir_path`) with
    /// checksums filled in wherever they could be resolved.
    ///
    /// A failed fetch leaves that entry's checksum empty; it never fails
    /// the batch.
    pub async fn enrich(&self, dir_path: &str, children: &[Entry]) -> Vec<Entry> {
        let mut out = children.to_vec();
        let gate = Arc::new(Semaphore::new(self.concurrency));
        let mut pending = Vec::new();

        for (idx, entry) in out.iter_mut().enumerate() {
            let Entry::File(file) = entry else { continue };
            if file.checksum.is_some() {
                continue;
            }
            let path = format!("{dir_path}{}", file.name);
            if let Some(hit) = self.cache.lookup(&path, &file.etag, file.observed_modified) {
                file.apply(&hit);
                continue;
            }

            let Ok(permit) = gate.clone().acquire_owned().await else {
                break;
            };
            let store = Arc::clone(&self.store);
            let cache = Arc::clone(&self.cache);
            let timeout = self.head_timeout;
            let etag = file.etag.clone();
            let observed = file.observed_modified;
            pending.push((
                idx,
                tokio::spawn(async move {
                    let _permit = permit;
                    let fetched = fetch_record(store.as_ref(), &path, observed, timeout).await;
                    match fetched {
                        Ok(record) => {
                            cache.insert(&path, &etag, record.clone());
                            Some(record)
                        }
                        Err(e) => {
                            tracing::warn!(path = %path, error = %e, "checksum fetch failed");
                            None
                        }
                    }
                }),
            ));
        }

        for (idx, handle) in pending {
            match handle.await {
                Ok(Some(record)) => {
                    if let Entry::File(file) = &mut out[idx] {
                        file.apply(&record);
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "checksum task aborted"),
            }
        }
        out
    }
}

impl std::fmt::Debug for Enricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enricher")
            .field("concurrency", &self.concurrency)
            .field("head_timeout", &self.head_timeout)
            .finish()
    }
}

/// HEAD one object and turn the answer into a cache record.
///
/// The record is validated against the listing's `observed` time, not the
/// HEAD `Last-Modified`: backends report the two at different precisions.
async fn fetch_record(
    store: &dyn ObjectStore,
    path: &str,
    observed: Option<DateTime<Utc>>,
    timeout: Duration,
) -> StoreResult<ChecksumRecord> {
    tracing::debug!(path, "fetching object metadata");
    let head = tokio::time::timeout(timeout, store.head(path))
        .await
        .map_err(|_| StoreError::Timeout(timeout))??;
    let display_time = head
        .metadata
        .get(METADATA_DATE_KEY)
        .and_then(|raw| parse_metadata_date(raw));
    Ok(ChecksumRecord {
        checksum: format_checksum(&head),
        display_time,
        observed_modified: observed,
    })
}

/// Render the preferred checksum as `{ALGO}hex`, falling back to
/// `{AWS-MD}etag`.
pub fn format_checksum(head: &ObjectHead) -> Option<String> {
    if let Some((algo, digest)) = head.preferred_checksum() {
        return Some(format!("{{{}}}{}", algo.label(), hex::encode(digest)));
    }
    if head.etag.is_empty() {
        None
    } else {
        Some(format!("{{AWS-MD}}{}", head.etag))
    }
}

/// Parse a `date` metadata value; anything malformed is ignored.
pub fn parse_metadata_date(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), METADATA_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
