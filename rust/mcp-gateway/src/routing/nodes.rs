//! Node discovery for adapter fleets.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::config::AdapterConfig;

/// Resolves the current set of live instance addresses for an adapter.
///
/// An empty map is a valid answer: the adapter exists but no instance is
/// live right now. Implementations may be backed by static configuration or
/// by an orchestrator; the routing handler does not care which.
#[async_trait]
pub trait NodeInfoProvider: Send + Sync {
    /// Live addresses for `adapter_name`, keyed by node id.
    async fn node_addresses(&self, adapter_name: &str) -> anyhow::Result<HashMap<String, String>>;
}

/// Node sets seeded from configuration.
///
/// Interior mutability lets a control plane swap an adapter's node set while
/// the gateway keeps serving.
#[derive(Debug, Default)]
pub struct StaticNodeInfoProvider {
    adapters: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl StaticNodeInfoProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the provider from the `adapters` config section.
    pub fn from_config(adapters: &HashMap<String, AdapterConfig>) -> Self {
        let provider = Self::new();
        for (name, adapter) in adapters {
            provider.set_nodes(name, adapter.nodes.clone());
        }
        provider
    }

    /// Replace the node set for `adapter_name`.
    pub fn set_nodes(&self, adapter_name: &str, addresses: Vec<String>) {
        let nodes = addresses
            .into_iter()
            .enumerate()
            .map(|(i, address)| (format!("node{i}"), address))
            .collect();
        self.adapters
            .write()
            .insert(adapter_name.to_string(), nodes);
    }

    /// Forget an adapter entirely.
    pub fn remove_adapter(&self, adapter_name: &str) {
        self.adapters.write().remove(adapter_name);
    }
}

#[async_trait]
impl NodeInfoProvider for StaticNodeInfoProvider {
    async fn node_addresses(&self, adapter_name: &str) -> anyhow::Result<HashMap<String, String>> {
        Ok(self
            .adapters
            .read()
            .get(adapter_name)
            .cloned()
            .unwrap_or_default())
    }
}
