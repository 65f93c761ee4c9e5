//! MCP Gateway - Main Entry Point
//!
//! Session-affine reverse proxy in front of a fleet of MCP adapter
//! instances.

use std::net::SocketAddr;

use clap::Parser;
use mimalloc::MiMalloc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mcp_gateway::config::AppConfig;
use mcp_gateway::server::create_app;

// Use mimalloc for better performance
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "mcp-gateway")]
#[command(about = "MCP Gateway - session-affine reverse proxy for adapter fleets")]
#[command(version)]
struct Args {
    /// Host to bind to (overrides config).
    #[arg(long, env = "MCP_GATEWAY_HOST")]
    host: Option<String>,

    /// Port to listen on (overrides config).
    #[arg(short, long, env = "MCP_GATEWAY_PORT")]
    port: Option<u16>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize tracing
    init_tracing(&args.log_level, config.logging.json);

    tracing::info!(
        "Starting MCP Gateway v{} (session-affine reverse proxy)",
        env!("CARGO_PKG_VERSION")
    );

    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);

    // Create the application
    let app = create_app(config).await?;
    tracing::info!("Application initialized");

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    // Run the server; connect-info feeds the Forwarded header provenance.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Initialize tracing/logging.
fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
