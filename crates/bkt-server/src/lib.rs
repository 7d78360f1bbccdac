//! HTTP server for the bucket browser.
//!
//! Serves a bucket as a browsable tree: directory paths get an HTML or JSON
//! listing (or a configured index file), object paths stream the object,
//! and PUT/DELETE are available when the unlock header is configured and
//! sent.

pub mod config;
pub mod error;
pub mod handler;
pub mod render;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{AppState, HealthResponse, JSON_LISTING_MEDIA_TYPE};
pub use server::BucketServer;
