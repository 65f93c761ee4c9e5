//! Adapter proxy endpoints.
//!
//! `/adapters/{name}/mcp` is the proxied MCP endpoint: requests carrying a
//! `session_id` query parameter are routed to the instance pinned for that
//! session; requests without one start a new session, and the minted id is
//! returned in the `Mcp-Session-Id` response header for the client to echo
//! back on every follow-up.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderValue, Method, Request, StatusCode};
use axum::response::Response;
use axum::routing::{any, delete};
use axum::Router;

use crate::error::{GatewayError, GatewayResult};
use crate::proxy::{self, ForwardedParts};
use crate::routing::handler::{has_session_param, session_id_from_query};
use crate::AppState;

/// Response header carrying a freshly minted session id.
pub const SESSION_ID_HEADER: &str = "Mcp-Session-Id";

/// Adapter proxy routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/adapters/{name}/mcp", any(proxy_adapter))
        .route(
            "/adapters/{name}/sessions/{session_id}",
            delete(unbind_session),
        )
}

/// Proxy one request to the adapter instance the session is pinned to.
async fn proxy_adapter(
    State(state): State<AppState>,
    Path(name): Path<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> GatewayResult<Response> {
    let claimed_session = session_id_from_query(request.uri());

    // A request that mentions session_id at all takes the existing-session
    // path, where an empty value is rejected instead of minting a session.
    let (target, minted_session) = if has_session_param(request.uri()) {
        let target = state.routing.existing_session_target(request.uri()).await?;
        (target, None)
    } else {
        let fresh = state.routing.new_session_target(&name).await?;
        (fresh.target_address, Some(fresh.session_id))
    };

    tracing::debug!(adapter = %name, target = %target, "Proxying request");

    let method = request.method().clone();
    let forwarded = ForwardedParts::from_request(&request, peer.ip());
    let outbound = proxy::build_proxied_request(
        &state.http,
        request,
        |uri| proxy::target_url(&target, uri),
        &forwarded,
    )?;

    let upstream = state
        .http
        .execute(outbound)
        .await
        .map_err(GatewayError::Upstream)?;

    // Streamable-HTTP session termination: a DELETE the backend accepted
    // ends the session, so the binding goes too.
    if method == Method::DELETE && upstream.status().is_success() {
        if let Some(session_id) = &claimed_session {
            state.routing.remove_session(session_id).await?;
        }
    }

    let mut response = proxy::relay_response(upstream);
    if let Some(session_id) = minted_session {
        let value =
            HeaderValue::from_str(&session_id).map_err(|e| GatewayError::Internal(e.into()))?;
        response.headers_mut().insert(SESSION_ID_HEADER, value);
    }
    Ok(response)
}

/// Unbind a session without touching the backend.
async fn unbind_session(
    State(state): State<AppState>,
    Path((name, session_id)): Path<(String, String)>,
) -> GatewayResult<StatusCode> {
    state.routing.remove_session(&session_id).await?;
    tracing::info!(adapter = %name, session_id = %session_id, "Session unbound");
    Ok(StatusCode::NO_CONTENT)
}
