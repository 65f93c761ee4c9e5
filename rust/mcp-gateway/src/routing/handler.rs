//! Session-affine routing decisions.
//!
//! For a fresh session: ask node discovery for the adapter's live
//! instances, pick one uniformly at random, pin it in the session store.
//! For an established session: resolve the pinned instance, or fail — a
//! dead pinned target is a visible failure, never a silent re-route.

use std::sync::Arc;

use axum::http::Uri;
use rand::seq::IteratorRandom;
use uuid::Uuid;

use crate::error::{GatewayError, GatewayResult};
use crate::routing::nodes::NodeInfoProvider;
use crate::session::SessionStore;

/// Query parameter clients use to claim session affinity.
pub const SESSION_ID_PARAM: &str = "session_id";

/// Outcome of the new-session path: the minted id and the pinned address.
#[derive(Debug, Clone)]
pub struct NewSessionTarget {
    pub session_id: String,
    pub target_address: String,
}

/// Decides which backend instance serves each inbound request.
pub struct SessionRoutingHandler {
    nodes: Arc<dyn NodeInfoProvider>,
    sessions: Arc<dyn SessionStore>,
}

impl SessionRoutingHandler {
    pub fn new(nodes: Arc<dyn NodeInfoProvider>, sessions: Arc<dyn SessionStore>) -> Self {
        Self { nodes, sessions }
    }

    /// Pick a live instance for a fresh session and durably pin it.
    ///
    /// Selection is uniform random over the currently-live addresses; no
    /// weighting, no health probing. The session id is minted here (UUIDv4)
    /// and handed back for the API layer to communicate to the client.
    pub async fn new_session_target(&self, adapter_name: &str) -> GatewayResult<NewSessionTarget> {
        let addresses = self
            .nodes
            .node_addresses(adapter_name)
            .await
            .map_err(GatewayError::Internal)?;

        let target = addresses
            .values()
            .choose(&mut rand::rng())
            .cloned()
            .ok_or_else(|| GatewayError::NoCapacity {
                adapter: adapter_name.to_string(),
            })?;

        let session_id = Uuid::new_v4().to_string();
        self.sessions.set(&session_id, &target).await?;

        tracing::info!(
            adapter = %adapter_name,
            session_id = %session_id,
            target = %target,
            "New session pinned"
        );

        Ok(NewSessionTarget {
            session_id,
            target_address: target,
        })
    }

    /// Resolve the pinned instance for a request claiming an existing
    /// session.
    pub async fn existing_session_target(&self, uri: &Uri) -> GatewayResult<String> {
        let session_id = session_id_from_query(uri).ok_or(GatewayError::SessionIdMissing)?;

        match self.sessions.try_get(&session_id).await? {
            Some(target) => Ok(target),
            None => Err(GatewayError::SessionNotFound),
        }
    }

    /// Drop the binding for `session_id` from both tiers.
    pub async fn remove_session(&self, session_id: &str) -> GatewayResult<()> {
        self.sessions.remove(session_id).await
    }
}

impl std::fmt::Debug for SessionRoutingHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRoutingHandler").finish_non_exhaustive()
    }
}

/// `session_id` query value, if present and non-empty.
pub fn session_id_from_query(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == SESSION_ID_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Whether the query string carries a `session_id` key at all, even empty.
///
/// Presence routes the request down the existing-session path, where an
/// empty value is rejected as invalid rather than silently minting a new
/// session.
pub fn has_session_param(uri: &Uri) -> bool {
    let Some(query) = uri.query() else {
        return false;
    };
    url::form_urlencoded::parse(query.as_bytes()).any(|(key, _)| key == SESSION_ID_PARAM)
}
