//! Object store client for the bucket browser.
//!
//! A bucket is a flat key space: there are no directories, only keys that
//! happen to contain `/`. This crate exposes exactly the operations the
//! namespace cache and the HTTP surface need, behind the [`ObjectStore`]
//! trait, so the rest of the system never touches a vendor SDK directly.
//!
//! # Backends
//!
//! - [`InMemoryObjectStore`] -- `BTreeMap`-based store for tests and demos,
//!   with real pagination and fault injection
//! - [`S3ObjectStore`] -- any S3-compatible service via `aws-sdk-s3`
//!
//! # Design Rules
//!
//! 1. Listing is always paginated; callers drive continuation tokens.
//! 2. ETags are returned unquoted.
//! 3. Checksums are returned as raw digests; formatting is a caller concern.
//! 4. Missing keys are `StoreError::NotFound`, everything else is opaque.

pub mod error;
pub mod memory;
pub mod object;
pub mod s3;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryObjectStore, MemoryObject};
pub use object::{
    unquote_etag, ChecksumAlgorithm, ListPage, ObjectBody, ObjectHead, ObjectSummary,
};
pub use s3::{S3Config, S3ObjectStore};
pub use traits::ObjectStore;
