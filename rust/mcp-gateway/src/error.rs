//! Gateway error taxonomy.
//!
//! Every failure in the routing/proxy core surfaces to the caller as a
//! [`GatewayError`]; nothing here logs-and-continues. The HTTP boundary maps
//! each variant to a status code and a JSON `{error, message}` body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Failures raised by the session routing and proxy core.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request claims session affinity but carries no usable session id.
    #[error("Session id not found in the request.")]
    SessionIdMissing,

    /// The supplied session id has no live binding.
    #[error("Session id is not valid, or has expired.")]
    SessionNotFound,

    /// An adapter has zero live instances while minting a new session.
    /// Distinct from [`Self::SessionNotFound`]: the session is fine, the
    /// fleet is empty.
    #[error("No live instances available for adapter '{adapter}'")]
    NoCapacity { adapter: String },

    /// The outbound call to the pinned backend failed at the transport
    /// level. Propagated as-is: no retry, no failover to another instance.
    #[error("Upstream request failed: {0}")]
    Upstream(#[source] reqwest::Error),

    /// The shared session tier is unavailable, or a two-tier write/delete
    /// could not complete on both tiers.
    #[error("Session store failure: {0}")]
    Store(#[source] anyhow::Error),

    /// Node discovery or another infrastructure dependency failed.
    #[error("Internal gateway error: {0}")]
    Internal(#[source] anyhow::Error),
}

/// Result alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    /// HTTP status the variant maps to at the serving boundary.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::SessionIdMissing => StatusCode::BAD_REQUEST,
            Self::SessionNotFound => StatusCode::NOT_FOUND,
            Self::NoCapacity { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error kind for response bodies.
    fn kind(&self) -> &'static str {
        match self {
            Self::SessionIdMissing => "invalid_request",
            Self::SessionNotFound => "invalid_session",
            Self::NoCapacity { .. } => "no_capacity",
            Self::Upstream(_) => "upstream_failure",
            Self::Store(_) => "store_failure",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_facing_messages_are_exact() {
        assert_eq!(
            GatewayError::SessionIdMissing.to_string(),
            "Session id not found in the request."
        );
        assert_eq!(
            GatewayError::SessionNotFound.to_string(),
            "Session id is not valid, or has expired."
        );
    }

    #[test]
    fn test_no_capacity_is_not_an_invalid_session() {
        let err = GatewayError::NoCapacity {
            adapter: "billing".to_string(),
        };
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_ne!(err.status(), GatewayError::SessionNotFound.status());
        assert!(err.to_string().contains("billing"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GatewayError::SessionIdMissing.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(GatewayError::SessionNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            GatewayError::Store(anyhow::anyhow!("redis down")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
