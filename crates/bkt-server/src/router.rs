use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router: the health check on its configured path, and every
/// other path mapped onto the bucket.
pub fn build_router(state: Arc<AppState>) -> Router {
    let health_path = state.config.health_path.clone();
    Router::new()
        .route(&health_path, get(handler::health_handler))
        .fallback(handler::bucket_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
