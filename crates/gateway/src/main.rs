//! `gateway` — the composition root for the MCP gateway.
//!
//! Parses CLI flags, loads [`GatewayConfig`] and the upstream registry,
//! registers a [`TransportFactory`] per enabled wire dialect, assembles
//! [`AppState`], and serves [`gateway_server::build_router`] until a
//! Ctrl+C or SIGTERM asks it to stop.

mod auth;
mod factories;
mod rate_limit;
mod upstreams;

use std::collections::HashMap;
use std::sync::Arc;

use clap::Parser;
use gateway_server::{AppState, GatewayConfig, NullLoggingSink, build_router};
use gateway_session::SessionManager;
use gateway_transport::TransportManager;
use gateway_transport_traits::{TransportEventEmitter, TransportFactory, TransportType};
use tracing::{info, warn};

use auth::AllowAllAuthProvider;
use factories::{HttpTransportFactory, SseTransportFactory, StdioTransportFactory, StreamableTransportFactory, WebSocketTransportFactory};
use rate_limit::FixedWindowRateLimiter;
use upstreams::StaticUpstreamRegistry;

/// Command-line flags for the gateway daemon.
#[derive(Parser, Debug)]
#[command(name = "gateway", version, about = "MCP application-layer gateway: terminates five wire dialects behind one HTTP surface")]
struct Cli {
    /// Path to a TOML configuration file layered under built-in defaults
    /// and `MCP_GATEWAY_*` environment variables.
    #[arg(short, long, env = "MCP_GATEWAY_CONFIG")]
    config: Option<String>,

    /// Path to a TOML file defining the upstream registry (`[upstreams.<id>]`).
    /// Falls back to a single `default` upstream at `http://localhost:3000/rpc`.
    #[arg(short, long, env = "MCP_GATEWAY_UPSTREAMS")]
    upstreams: Option<String>,

    /// Enable verbose logging (-v, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn init_tracing(&self) {
        let default_level = match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.init_tracing();

    let config = GatewayConfig::load(cli.config.as_deref())?;
    let upstream_registry = StaticUpstreamRegistry::load(cli.upstreams.as_deref())?;

    info!(bind_addr = %config.bind_addr, transports = ?config.enabled_transports, "starting mcp gateway");

    let session_manager = Arc::new(SessionManager::new(config.session_timeout));
    tokio::spawn(session_manager.clone().sweep_loop(gateway_session::DEFAULT_SWEEP_INTERVAL));

    let (events, mut event_rx) = TransportEventEmitter::new();
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            tracing::debug!(?event, "transport event");
        }
    });

    let factories = build_factories(&config, session_manager.clone(), events);
    let transport_manager = Arc::new(TransportManager::new(session_manager.clone(), factories));

    let state = AppState {
        sessions: session_manager,
        transports: transport_manager,
        auth: Arc::new(AllowAllAuthProvider),
        rate_limiter: Arc::new(FixedWindowRateLimiter::permissive()),
        upstreams: Arc::new(upstream_registry),
        logging: Arc::new(NullLoggingSink),
        config: config.clone(),
    };

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(bind_addr = %config.bind_addr, "mcp gateway listening");

    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;
    info!("mcp gateway shut down");
    Ok(())
}

/// Register a [`TransportFactory`] for each transport type `config` enables.
fn build_factories(
    config: &GatewayConfig,
    session_manager: Arc<SessionManager>,
    events: TransportEventEmitter,
) -> HashMap<TransportType, Arc<dyn TransportFactory>> {
    let mut factories: HashMap<TransportType, Arc<dyn TransportFactory>> = HashMap::new();
    for transport_type in &config.enabled_transports {
        let factory: Arc<dyn TransportFactory> = match transport_type {
            TransportType::Http => Arc::new(HttpTransportFactory),
            TransportType::Sse => Arc::new(SseTransportFactory::new(session_manager.clone(), config.sse_keep_alive)),
            TransportType::WebSocket => Arc::new(WebSocketTransportFactory::new(config.websocket_read_timeout, Some(events.clone()))),
            TransportType::Streamable => Arc::new(StreamableTransportFactory::new(session_manager.clone())),
            TransportType::Stdio => Arc::new(StdioTransportFactory::new(session_manager.clone(), Some(events.clone()))),
        };
        factories.insert(*transport_type, factory);
    }
    factories
}

/// Resolves once a Ctrl+C or (on Unix) SIGTERM is received, for
/// `axum::serve`'s graceful shutdown hook.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => warn!("received Ctrl+C, shutting down"),
        () = terminate => warn!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_with_no_arguments() {
        let cli = Cli::try_parse_from(["gateway"]).unwrap();
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
    }

    #[test]
    fn cli_accepts_a_config_path_and_verbosity() {
        let cli = Cli::try_parse_from(["gateway", "-c", "gateway.toml", "-vv"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("gateway.toml"));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn build_factories_registers_one_factory_per_enabled_transport() {
        let config = GatewayConfig::default();
        let session_manager = Arc::new(SessionManager::new(config.session_timeout));
        let (events, _rx) = TransportEventEmitter::new();
        let factories = build_factories(&config, session_manager, events);
        assert_eq!(factories.len(), config.enabled_transports.len());
    }
}
