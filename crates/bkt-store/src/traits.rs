use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreResult;
use crate::object::{ListPage, ObjectBody, ObjectHead};

/// Client for a flat object bucket.
///
/// All implementations must satisfy these invariants:
/// - Keys are opaque strings; the store has no directory concept.
/// - `list_page` pages through every key in the bucket in key order; a
///   `None` continuation starts from the beginning.
/// - Missing keys surface as [`crate::StoreError::NotFound`], never as an
///   empty success.
/// - Backend failures are propagated, never silently ignored.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one page of the bucket listing.
    async fn list_page(&self, continuation: Option<&str>) -> StoreResult<ListPage>;

    /// Fetch size, identity tag, checksums, and user metadata for one key.
    async fn head(&self, key: &str) -> StoreResult<ObjectHead>;

    /// Read an object's full content.
    async fn get(&self, key: &str) -> StoreResult<ObjectBody>;

    /// Create or replace an object.
    async fn put(&self, key: &str, data: Bytes, content_type: Option<&str>) -> StoreResult<()>;

    /// Delete an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}
