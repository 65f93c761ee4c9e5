//! HTTP server setup and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::logging::OpTimer;
use crate::routing::{SessionRoutingHandler, StaticNodeInfoProvider};
use crate::session::{DistributedCache, InMemoryCache, RedisCache, SessionStore, TwoTierSessionStore};
use crate::{api, log_init_step, log_init_warning, AppState};

/// Create the application with all routes and middleware.
pub async fn create_app(config: AppConfig) -> anyhow::Result<Router> {
    let overall_timer = OpTimer::new("server", "create_app");

    // [1/5] Shared session tier
    let step_timer = OpTimer::new("server", "shared_cache");
    let (shared, cache_backend): (Arc<dyn DistributedCache>, &'static str) =
        if let Some(ref redis_url) = config.redis.url {
            match RedisCache::connect(redis_url).await {
                Ok(cache) => {
                    log_init_step!(1, 5, "Shared cache", format!("redis at {redis_url}"));
                    (Arc::new(cache), "redis")
                }
                Err(e) => {
                    log_init_warning!(
                        "Failed to connect to Redis: {}. Using in-memory shared tier.",
                        e
                    );
                    (Arc::new(InMemoryCache::new()), "in-memory")
                }
            }
        } else {
            log_init_step!(1, 5, "Shared cache", "in-memory (single replica only)");
            (Arc::new(InMemoryCache::new()), "in-memory")
        };
    step_timer.finish();

    // [2/5] Session store
    let ttl = Duration::from_secs(config.session.ttl_secs);
    let sessions: Arc<dyn SessionStore> = Arc::new(TwoTierSessionStore::new(shared, ttl));
    log_init_step!(
        2,
        5,
        "Session store",
        format!("two-tier, ttl {}s", config.session.ttl_secs)
    );

    // [3/5] Node discovery
    let nodes = Arc::new(StaticNodeInfoProvider::from_config(&config.adapters));
    if config.adapters.is_empty() {
        log_init_warning!("No adapters configured; every new session will fail with no capacity.");
    }
    log_init_step!(
        3,
        5,
        "Node discovery",
        format!("{} adapter fleet(s) configured", config.adapters.len())
    );

    // [4/5] Routing handler
    let routing = Arc::new(SessionRoutingHandler::new(nodes, sessions));
    log_init_step!(4, 5, "Routing", "session-affine handler ready");

    // [5/5] Outbound client and router
    let step_timer = OpTimer::new("server", "router");
    // Connect timeout only: proxied bodies may stream for a long time, so a
    // whole-request timeout would sever live sessions.
    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.server.connect_timeout_secs))
        .build()?;

    let state = AppState {
        config: Arc::new(config),
        http,
        routing,
        cache_backend,
    };

    let app = api::create_router()
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);
    log_init_step!(5, 5, "Router", "HTTP surface ready");
    step_timer.finish();

    overall_timer.finish();
    Ok(app)
}
