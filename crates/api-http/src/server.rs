//! HTTP Server
//!
//! Routes:
//! - `POST /generate` → `application/gzip` archive
//! - `POST /validate` → `{ jobId, valid, diagnostics }`
//! - `GET /health` (never authenticated)

use crate::handler::{self, AppState};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use tracing::info;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
/// Upload cap for a single request (32 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// HTTP Server Configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// HTTP Server
pub struct ApiServer {
    config: ServerConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Build the router
    pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
        Router::new()
            .route("/generate", post(handler::generate))
            .route("/validate", post(handler::validate))
            .route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                handler::require_api_key,
            ))
            .route("/health", get(handler::health))
            .layer(DefaultBodyLimit::max(max_upload_bytes))
            .with_state(state)
    }

    /// Bind and serve until `shutdown` resolves
    ///
    /// In-flight requests are allowed to finish, so their jobs still release
    /// their workspaces.
    pub async fn serve<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local: SocketAddr = listener.local_addr()?;

        info!(
            addr = %local,
            max_upload_bytes = %self.config.max_upload_bytes,
            auth = self.state.api_key.is_some(),
            "HTTP API listening"
        );

        let router = Self::router(self.state, self.config.max_upload_bytes);
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
