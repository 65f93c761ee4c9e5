//! Configuration management for the MCP gateway.
//!
//! Configuration is loaded from defaults, an optional config file
//! (`config/mcp-gateway.{yaml,toml,json}`) and environment variables with the
//! `MCP_GATEWAY_` prefix (`__` separates nested sections, e.g.
//! `MCP_GATEWAY_SERVER__PORT`), in that order.
//! Adapter fleets are declared under the `adapters` section; node discovery
//! picks them up at startup.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Redis configuration for the shared session tier.
    #[serde(default)]
    pub redis: RedisConfig,
    /// Session affinity configuration.
    #[serde(default)]
    pub session: SessionConfig,
    /// Statically configured adapter fleets, keyed by adapter name.
    #[serde(default)]
    pub adapters: HashMap<String, AdapterConfig>,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from defaults, config files and the environment.
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .add_source(config::File::with_name("config/mcp-gateway").required(false))
            .add_source(
                config::Environment::with_prefix("MCP_GATEWAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut app_config: AppConfig = config.try_deserialize()?;

        // Well-known environment variables win over file settings
        if let Ok(url) = std::env::var("REDIS_URL") {
            app_config.redis.url = Some(url);
        }

        Ok(app_config)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Connect timeout for the outbound proxy leg, in seconds. There is no
    /// overall request timeout: proxied bodies may stream indefinitely.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Redis configuration.
///
/// When no URL is configured the gateway falls back to an in-memory shared
/// tier, which is only correct for single-replica deployments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: Option<String>,
}

/// Session affinity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Time-to-live for session bindings, in seconds. Applied to both tiers
    /// so the local cache cannot outlive the shared entry.
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
}

fn default_session_ttl() -> u64 {
    86400 // 24 hours
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
        }
    }
}

/// One statically configured adapter fleet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Addresses of the live instances, one URI per node.
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to emit JSON-formatted logs.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.session.ttl_secs, 86400);
        assert!(cfg.redis.url.is_none());
        assert!(cfg.adapters.is_empty());
        assert!(!cfg.logging.json);
    }

    #[test]
    fn test_adapter_fleets_parse_from_yaml() {
        let yaml = r#"
session:
  ttl_secs: 600
adapters:
  billing:
    nodes:
      - http://10.0.0.1:8080
      - http://10.0.0.2:8080
  echo:
    nodes: []
"#;
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.session.ttl_secs, 600);
        assert_eq!(cfg.adapters["billing"].nodes.len(), 2);
        assert!(cfg.adapters["echo"].nodes.is_empty());
        // Untouched sections keep their defaults
        assert_eq!(cfg.server.port, 8080);
    }
}
