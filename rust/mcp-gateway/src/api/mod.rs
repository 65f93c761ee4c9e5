//! HTTP surface of the gateway.

pub mod adapters;
pub mod health;

use axum::Router;

use crate::AppState;

/// Create the gateway router with all routes.
pub fn create_router() -> Router<AppState> {
    Router::new().merge(health::router()).merge(adapters::router())
}
