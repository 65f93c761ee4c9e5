//! MCP Gateway - Session-Affine Reverse Proxy
//!
//! This crate provides a reverse-proxy gateway in front of a dynamically
//! scaled fleet of MCP adapter instances:
//!
//! - **Session affinity**: every request carrying a session id is routed to
//!   the same backend instance for the session's lifetime, across any number
//!   of gateway replicas (two-tier store: process-local + Redis).
//! - **Uniform selection**: new sessions are pinned to a live instance
//!   chosen uniformly at random, with no weighting or health probing.
//! - **Streaming relay**: request and response bodies are pumped through as
//!   streams, so unbounded streamable-HTTP exchanges work unbuffered.
//! - **Header hygiene**: client `Authorization` is never forwarded, a
//!   `Forwarded` entry records provenance, and stale `Transfer-Encoding`
//!   never reaches the client.
//!
//! # Architecture
//!
//! - [`config`]: configuration management and environment loading
//! - [`session`]: two-tier session affinity store
//! - [`routing`]: node discovery and target selection
//! - [`proxy`]: request/response translation and body streaming
//! - [`api`]: HTTP endpoints
//! - [`server`]: application assembly and middleware
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_gateway::{config::AppConfig, server::create_app};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load()?;
//!     let app = create_app(config).await?;
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(
//!         listener,
//!         app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
//!     )
//!     .await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod proxy;
pub mod routing;
pub mod server;
pub mod session;

use std::sync::Arc;

use config::AppConfig;
use routing::SessionRoutingHandler;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Outbound HTTP client for the proxy leg. One client, connection
    /// pooling across all proxied requests.
    pub http: reqwest::Client,
    /// Session-affine routing decisions.
    pub routing: Arc<SessionRoutingHandler>,
    /// Which backend serves as the shared session tier ("redis" or
    /// "in-memory").
    pub cache_backend: &'static str,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &"AppConfig")
            .field("cache_backend", &self.cache_backend)
            .finish_non_exhaustive()
    }
}
