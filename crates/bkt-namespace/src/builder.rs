//! Turns a flat, paginated bucket listing into a [`Namespace`].
//!
//! Keys are split on `/`. Every proper prefix becomes a directory, the last
//! segment becomes a file, and keys ending in `/` attach their attributes
//! to the directory they name. Aggregates are rolled up bottom-up once
//! every key has been seen, and children are sorted in natural order.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bkt_store::{ObjectStore, ObjectSummary};
use chrono::Utc;

use crate::entry::{DirEntry, Entry, FileEntry, MarkerStamp};
use crate::error::{NamespaceError, NamespaceResult};
use crate::namespace::{Directory, Namespace};
use crate::sort::natural_cmp;

#[derive(Default)]
struct PendingDir {
    files: Vec<FileEntry>,
    /// Child directory names, each with its trailing `/`.
    subdirs: Vec<String>,
    marker: Option<MarkerStamp>,
}

/// Accumulates listing records into a directory tree.
pub struct NamespaceBuilder {
    dirs: HashMap<String, PendingDir>,
    keys: u64,
}

impl NamespaceBuilder {
    /// Start with just the root directory.
    pub fn new() -> Self {
        let mut dirs = HashMap::new();
        dirs.insert(String::new(), PendingDir::default());
        Self { dirs, keys: 0 }
    }

    /// Number of listing records consumed so far.
    pub fn keys_seen(&self) -> u64 {
        self.keys
    }

    /// Page through the whole bucket and build a snapshot.
    ///
    /// Fails as soon as any page fails; nothing partial is ever returned.
    pub async fn build(store: &dyn ObjectStore) -> NamespaceResult<Namespace> {
        let started = Instant::now();
        let mut builder = Self::new();
        let mut token: Option<String> = None;
        let mut pages = 0usize;
        loop {
            let page = store
                .list_page(token.as_deref())
                .await
                .map_err(|source| NamespaceError::Build { pages, source })?;
            pages += 1;
            for object in &page.objects {
                builder.add(object);
            }
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        tracing::debug!(pages, keys = builder.keys, "bucket listing complete");
        Ok(builder.finish_timed(started.elapsed()))
    }

    /// Fold one listing record into the tree.
    pub fn add(&mut self, object: &ObjectSummary) {
        self.keys += 1;
        let key = object.key.as_str();
        let mut parent = "";
        let mut start = 0;
        for (idx, _) in key.match_indices('/') {
            let dir_path = &key[..=idx];
            if !self.dirs.contains_key(dir_path) {
                self.dirs.insert(dir_path.to_string(), PendingDir::default());
                self.dirs
                    .entry(parent.to_string())
                    .or_default()
                    .subdirs
                    .push(key[start..=idx].to_string());
            }
            parent = dir_path;
            start = idx + 1;
        }

        if object.is_marker() {
            // `parent` is now the key itself.
            self.dirs.entry(parent.to_string()).or_default().marker = Some(MarkerStamp {
                modified: object.last_modified,
                storage_class: object.storage_class.clone(),
            });
        } else {
            self.dirs
                .entry(parent.to_string())
                .or_default()
                .files
                .push(FileEntry {
                    name: key[start..].to_string(),
                    size: object.size,
                    modified: object.last_modified,
                    observed_modified: object.last_modified,
                    etag: object.etag.clone(),
                    storage_class: object.storage_class.clone(),
                    checksum: None,
                });
        }
    }

    /// Finish without a measured build time.
    pub fn finish(self) -> Namespace {
        self.finish_timed(Duration::ZERO)
    }

    fn finish_timed(self, build_time: Duration) -> Namespace {
        // Deepest first, so every subdirectory total is known before its
        // parent is summed.
        let mut order: Vec<&String> = self.dirs.keys().collect();
        order.sort_by_key(|path| std::cmp::Reverse(path.matches('/').count()));

        let mut totals: HashMap<&str, (u64, u64)> = HashMap::with_capacity(self.dirs.len());
        for path in order {
            let pending = &self.dirs[path];
            let mut size: u64 = pending.files.iter().map(|f| f.size).sum();
            let mut count = pending.files.len() as u64;
            for name in &pending.subdirs {
                let (s, c) = totals
                    .get(format!("{path}{name}").as_str())
                    .copied()
                    .unwrap_or_default();
                size += s;
                count += c;
            }
            totals.insert(path.as_str(), (size, count));
        }

        let markers: HashMap<&str, Option<MarkerStamp>> = self
            .dirs
            .iter()
            .map(|(path, pending)| (path.as_str(), pending.marker.clone()))
            .collect();

        let mut directories = HashMap::with_capacity(self.dirs.len());
        for (path, pending) in &self.dirs {
            let mut children: Vec<Entry> =
                Vec::with_capacity(pending.files.len() + pending.subdirs.len());
            for name in &pending.subdirs {
                let child_path = format!("{path}{name}");
                let (size, count) = totals.get(child_path.as_str()).copied().unwrap_or_default();
                children.push(Entry::Directory(DirEntry {
                    name: name.clone(),
                    size,
                    count,
                    marker: markers.get(child_path.as_str()).cloned().flatten(),
                }));
            }
            children.extend(pending.files.iter().cloned().map(Entry::File));
            children.sort_by(|a, b| natural_cmp(a.name(), b.name()));

            let (size, count) = totals.get(path.as_str()).copied().unwrap_or_default();
            directories.insert(
                path.clone(),
                Directory {
                    path: path.clone(),
                    size,
                    count,
                    marker: pending.marker.clone(),
                    children,
                },
            );
        }

        Namespace::from_parts(directories, Utc::now(), build_time)
    }
}

impl Default for NamespaceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
