use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::entry::{DirEntry, Entry, FileEntry, MarkerStamp};
use crate::sort::natural_cmp;

/// A directory node in a [`Namespace`], keyed by its full path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Directory {
    /// Full path with trailing `/`; `""` for the root.
    pub path: String,
    pub size: u64,
    pub count: u64,
    pub marker: Option<MarkerStamp>,
    /// Immediate children in natural order.
    pub children: Vec<Entry>,
}

impl Directory {
    /// Final path segment including the trailing `/`.
    pub fn name(&self) -> &str {
        let trimmed = self.path.strip_suffix('/').unwrap_or(&self.path);
        match trimmed.rfind('/') {
            Some(idx) => &self.path[idx + 1..],
            None => &self.path,
        }
    }

    /// This directory as a row of its parent's listing.
    pub fn summary(&self) -> DirEntry {
        DirEntry {
            name: self.name().to_string(),
            size: self.size,
            count: self.count,
            marker: self.marker.clone(),
        }
    }

    /// Find a child by exact name (directories carry their trailing `/`).
    ///
    /// Binary search: `children` must stay sorted by [`natural_cmp`], which
    /// is a total order, so names equal under case folding or digit runs
    /// (`File1`, `file1`, `file01`) still land on distinct slots.
    pub fn child(&self, name: &str) -> Option<&Entry> {
        self.children
            .binary_search_by(|e| natural_cmp(e.name(), name))
            .ok()
            .map(|idx| &self.children[idx])
    }
}

/// Result of resolving a path against a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolved<'a> {
    Directory(&'a Directory),
    File(&'a FileEntry),
}

impl Resolved<'_> {
    /// Owned listing row for the resolved node.
    pub fn to_entry(&self) -> Entry {
        match self {
            Self::Directory(d) => Entry::Directory(d.summary()),
            Self::File(f) => Entry::File((*f).clone()),
        }
    }
}

/// An immutable hierarchical view of one complete bucket listing.
///
/// Built once by [`crate::NamespaceBuilder`] and never mutated afterwards;
/// a refresh produces a whole new `Namespace`.
#[derive(Clone, Debug)]
pub struct Namespace {
    directories: HashMap<String, Directory>,
    built_at: DateTime<Utc>,
    build_time: Duration,
}

impl Namespace {
    pub(crate) fn from_parts(
        directories: HashMap<String, Directory>,
        built_at: DateTime<Utc>,
        build_time: Duration,
    ) -> Self {
        Self {
            directories,
            built_at,
            build_time,
        }
    }

    /// When the listing behind this snapshot completed.
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Wall-clock time spent listing and assembling this snapshot.
    pub fn build_time(&self) -> Duration {
        self.build_time
    }

    /// The root directory (path `""`).
    pub fn root(&self) -> &Directory {
        // The builder always creates the root, even for an empty bucket.
        &self.directories[""]
    }

    /// Bucket-wide `(size, count)`.
    pub fn totals(&self) -> (u64, u64) {
        let root = self.root();
        (root.size, root.count)
    }

    /// Number of directories, including the root.
    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }

    /// Look up a directory by path. `"docs"` and `"docs/"` are equivalent.
    pub fn directory(&self, path: &str) -> Option<&Directory> {
        if path.is_empty() || path.ends_with('/') {
            self.directories.get(path)
        } else {
            self.directories.get(&format!("{path}/"))
        }
    }

    pub fn is_directory(&self, path: &str) -> bool {
        self.directory(path).is_some()
    }

    /// Look up a leaf object by full key.
    pub fn file(&self, path: &str) -> Option<&FileEntry> {
        if path.is_empty() || path.ends_with('/') {
            return None;
        }
        let (parent, name) = match path.rfind('/') {
            Some(idx) => (&path[..=idx], &path[idx + 1..]),
            None => ("", path),
        };
        self.directories
            .get(parent)?
            .child(name)
            .and_then(Entry::as_file)
    }

    pub fn is_file(&self, path: &str) -> bool {
        self.file(path).is_some()
    }

    /// Resolve a path to a directory or a file. Paths ending in `/` (and
    /// the empty root path) only ever resolve to directories.
    pub fn resolve(&self, path: &str) -> Option<Resolved<'_>> {
        if path.is_empty() || path.ends_with('/') {
            return self.directories.get(path).map(Resolved::Directory);
        }
        self.file(path).map(Resolved::File)
    }

    /// `path` and every directory below it, in pre-order with children
    /// visited in natural order.
    pub fn walk(&self, path: &str) -> Vec<&Directory> {
        let mut out = Vec::new();
        let Some(start) = self.directory(path) else {
            return out;
        };
        let mut stack = vec![start];
        while let Some(dir) = stack.pop() {
            out.push(dir);
            for child in dir.children.iter().rev() {
                if let Entry::Directory(sub) = child {
                    if let Some(next) = self.directories.get(&format!("{}{}", dir.path, sub.name)) {
                        stack.push(next);
                    }
                }
            }
        }
        out
    }

    /// All directories, unordered.
    pub fn directories(&self) -> impl Iterator<Item = &Directory> {
        self.directories.values()
    }
}
