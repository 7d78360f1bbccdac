//! Namespace cache for the bucket browser.
//!
//! A bucket has no directories, only keys. This crate periodically lists
//! the whole key space and materializes it as an immutable tree of
//! directories and files ([`Namespace`]), caches that tree for a bounded
//! time ([`SnapshotCache`]), and fills in per-object checksums on demand
//! through a bounded fan-out of metadata calls ([`Enricher`]) backed by a
//! long-lived [`ChecksumCache`].
//!
//! # Design Rules
//!
//! 1. A published `Namespace` is never mutated. Rebuilds construct a new one
//!    off to the side and swap a single `Arc`.
//! 2. A failed listing never replaces the snapshot; the previous one keeps
//!    serving and the error is retained for health checks.
//! 3. Directory totals are rolled up bottom-up in one pass at build time.
//! 4. Children are kept in case-insensitive natural order.
//! 5. Cached checksums outlive snapshots and are valid only while the
//!    object's identity tag and modification time are unchanged.

pub mod builder;
pub mod checksum;
pub mod config;
pub mod enrich;
pub mod entry;
pub mod error;
pub mod namespace;
pub mod service;
pub mod snapshot;
pub mod sort;

pub use builder::NamespaceBuilder;
pub use checksum::{ChecksumCache, ChecksumKey, ChecksumRecord};
pub use config::NamespaceConfig;
pub use enrich::{format_checksum, parse_metadata_date, Enricher};
pub use entry::{DirEntry, Entry, FileEntry, MarkerStamp};
pub use error::{NamespaceError, NamespaceResult};
pub use namespace::{Directory, Namespace, Resolved};
pub use service::{BucketNamespace, Listing};
pub use snapshot::{SnapshotCache, SnapshotStatus};
pub use sort::natural_cmp;
