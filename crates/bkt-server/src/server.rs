use std::sync::Arc;

use bkt_store::ObjectStore;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Bucket browser HTTP server.
pub struct BucketServer {
    state: Arc<AppState>,
}

impl BucketServer {
    pub fn new(config: ServerConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            state: Arc::new(AppState::new(store, config)),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state())
    }

    /// Start serving requests until ctrl-c.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.state.config.bind_addr).await?;
        tracing::info!(
            addr = %self.state.config.bind_addr,
            writes = self.state.config.writes_enabled(),
            "bucket browser listening"
        );

        let warm = self.state();
        tokio::spawn(async move {
            if let Err(e) = warm.namespace.current().await {
                tracing::warn!(error = %e, "initial namespace build failed");
            }
        });

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use bkt_store::InMemoryObjectStore;

    #[test]
    fn server_construction() {
        let server = BucketServer::new(ServerConfig::default(), Arc::new(InMemoryObjectStore::new()));
        assert_eq!(server.config().bind_addr, "0.0.0.0:8080".parse().unwrap());
    }

    #[test]
    fn router_builds() {
        let server = BucketServer::new(ServerConfig::default(), Arc::new(InMemoryObjectStore::new()));
        let _router = server.router();
    }
}
