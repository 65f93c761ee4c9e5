//! Two-tier session affinity store.
//!
//! A fast process-local map layered in front of the replica-shared cache.
//! The shared tier is authoritative; the local tier only speeds up lookups
//! for bindings this process wrote.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};
use crate::session::cache::DistributedCache;

/// Key prefix for session bindings in the shared tier.
const SESSION_KEY_PREFIX: &str = "session:";

/// Sticky mapping for one session, as serialized into the shared tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionBinding {
    /// Address of the backend instance pinned for this session.
    pub target_address: String,
    /// When the binding was minted.
    pub created_at: DateTime<Utc>,
}

/// Session-id to backend-address mapping consulted on every proxied request.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Resolve the pinned target for `session_id`, or `None` if the session
    /// is unknown or expired.
    async fn try_get(&self, session_id: &str) -> GatewayResult<Option<String>>;

    /// Bind `session_id` to `target_address` in both tiers. Fails without
    /// partial effect if the shared tier cannot be written.
    async fn set(&self, session_id: &str, target_address: &str) -> GatewayResult<()>;

    /// Delete the binding from both tiers.
    async fn remove(&self, session_id: &str) -> GatewayResult<()>;
}

struct LocalEntry {
    binding: SessionBinding,
    expires_at: Instant,
}

/// Two-tier [`SessionStore`]: process-local map over the shared cache.
///
/// A hit served from the shared tier is NOT copied into the local tier. A
/// `remove` issued by another replica deletes the shared entry but cannot
/// reach this process's map, so a backfilled copy would keep serving a dead
/// binding; fallback hits stay remote-only instead. Local entries carry the
/// same TTL as the shared tier and are evicted lazily on lookup.
pub struct TwoTierSessionStore {
    local: RwLock<HashMap<String, LocalEntry>>,
    shared: Arc<dyn DistributedCache>,
    ttl: Duration,
}

impl TwoTierSessionStore {
    pub fn new(shared: Arc<dyn DistributedCache>, ttl: Duration) -> Self {
        Self {
            local: RwLock::new(HashMap::new()),
            shared,
            ttl,
        }
    }

    fn shared_key(session_id: &str) -> String {
        format!("{SESSION_KEY_PREFIX}{session_id}")
    }

    /// Local-tier lookup; evicts the entry if its TTL has lapsed.
    fn local_get(&self, session_id: &str) -> Option<String> {
        let now = Instant::now();
        {
            let local = self.local.read();
            match local.get(session_id) {
                Some(entry) if entry.expires_at > now => {
                    return Some(entry.binding.target_address.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: re-check under the write lock before evicting, another
        // request may have re-bound the id in between.
        let mut local = self.local.write();
        if let Some(entry) = local.get(session_id) {
            if entry.expires_at > now {
                return Some(entry.binding.target_address.clone());
            }
            local.remove(session_id);
        }
        None
    }
}

impl std::fmt::Debug for TwoTierSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoTierSessionStore")
            .field("local_entries", &self.local.read().len())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionStore for TwoTierSessionStore {
    async fn try_get(&self, session_id: &str) -> GatewayResult<Option<String>> {
        // Local tier first: no network round trip.
        if let Some(target) = self.local_get(session_id) {
            return Ok(Some(target));
        }

        let payload = self
            .shared
            .get(&Self::shared_key(session_id))
            .await
            .map_err(GatewayError::Store)?;

        match payload {
            Some(json) => {
                let binding: SessionBinding = serde_json::from_str(&json)
                    .map_err(|e| GatewayError::Store(e.into()))?;
                Ok(Some(binding.target_address))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, session_id: &str, target_address: &str) -> GatewayResult<()> {
        let binding = SessionBinding {
            target_address: target_address.to_string(),
            created_at: Utc::now(),
        };
        let payload = serde_json::to_string(&binding).map_err(|e| GatewayError::Store(e.into()))?;

        // Shared tier first: if the replica-visible write fails, the whole
        // operation fails and the local tier stays untouched.
        self.shared
            .set(&Self::shared_key(session_id), payload, self.ttl)
            .await
            .map_err(GatewayError::Store)?;

        self.local.write().insert(
            session_id.to_string(),
            LocalEntry {
                binding,
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> GatewayResult<()> {
        // Shared tier first: if this fails, both tiers still agree that the
        // binding exists, and the caller sees the error.
        self.shared
            .remove(&Self::shared_key(session_id))
            .await
            .map_err(GatewayError::Store)?;

        self.local.write().remove(session_id);
        Ok(())
    }
}
