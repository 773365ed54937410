//! Layered gateway configuration: built-in defaults, an optional TOML file,
//! then environment variables prefixed `MCP_GATEWAY_`, using the `config`
//! crate's source-stacking the way the rest of this workspace's dependency
//! set is meant to be exercised rather than hand-rolled.

use std::net::SocketAddr;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use gateway_transport_traits::TransportType;
use serde::{Deserialize, Serialize};

/// Default bind address for the HTTP listener.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Default session idle timeout, matching [`gateway_session::DEFAULT_SESSION_TIMEOUT`].
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 30 * 60;

/// Default SSE keep-alive cadence.
pub const DEFAULT_SSE_KEEP_ALIVE_SECS: u64 = 15;

/// Default WebSocket read timeout (no pong within this window tears the
/// connection down, per §8's "WebSocket no-pong-60s" boundary behavior).
pub const DEFAULT_WEBSOCKET_READ_TIMEOUT_SECS: u64 = 60;

/// Default STDIO child-process read timeout.
pub const DEFAULT_STDIO_READ_TIMEOUT_SECS: u64 = 30;

/// The shape the `config` crate deserializes into before it's converted to
/// [`GatewayConfig`]. Kept separate so every field can have a plain scalar
/// type `config`/`serde` can merge across sources (durations are stored as
/// seconds and converted on the way out).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawConfig {
    bind_addr: String,
    enabled_transports: Vec<String>,
    session_timeout_secs: u64,
    sse_keep_alive_secs: u64,
    websocket_read_timeout_secs: u64,
    stdio_read_timeout_secs: u64,
    max_message_bytes: usize,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            enabled_transports: vec![
                "http".into(),
                "sse".into(),
                "websocket".into(),
                "streamable".into(),
                "stdio".into(),
            ],
            session_timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
            sse_keep_alive_secs: DEFAULT_SSE_KEEP_ALIVE_SECS,
            websocket_read_timeout_secs: DEFAULT_WEBSOCKET_READ_TIMEOUT_SECS,
            stdio_read_timeout_secs: DEFAULT_STDIO_READ_TIMEOUT_SECS,
            max_message_bytes: gateway_protocol::validation::DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

/// Resolved gateway configuration: which transports to register factories
/// for, the session timeout, per-dialect timeouts, and the HTTP bind address.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address the HTTP listener binds.
    pub bind_addr: SocketAddr,
    /// Transport types the composition root should register driver factories
    /// for (§4.2).
    pub enabled_transports: Vec<TransportType>,
    /// Idle timeout after which [`gateway_session::SessionManager::sweep`]
    /// reclaims a session.
    pub session_timeout: Duration,
    /// Interval between SSE keep-alive comments on an idle stream.
    pub sse_keep_alive: Duration,
    /// WebSocket read timeout; no pong inside this window tears the
    /// connection down.
    pub websocket_read_timeout: Duration,
    /// STDIO child-process read timeout.
    pub stdio_read_timeout: Duration,
    /// Maximum accepted message size, shared by every dialect's framing
    /// layer.
    pub max_message_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        RawConfig::default()
            .try_into_gateway_config()
            .expect("default configuration is always valid")
    }
}

impl GatewayConfig {
    /// Load configuration layered as: built-in defaults, then an optional
    /// TOML file at `config_path` (ignored if absent), then environment
    /// variables prefixed `MCP_GATEWAY_` (e.g. `MCP_GATEWAY_BIND_ADDR`).
    ///
    /// # Errors
    ///
    /// Returns an error if a present config file fails to parse, or if a
    /// value in any layer cannot be coerced into the expected type.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let defaults = RawConfig::default();
        let mut builder = Config::builder()
            .set_default("bind_addr", defaults.bind_addr)?
            .set_default("enabled_transports", defaults.enabled_transports)?
            .set_default("session_timeout_secs", defaults.session_timeout_secs)?
            .set_default("sse_keep_alive_secs", defaults.sse_keep_alive_secs)?
            .set_default(
                "websocket_read_timeout_secs",
                defaults.websocket_read_timeout_secs,
            )?
            .set_default("stdio_read_timeout_secs", defaults.stdio_read_timeout_secs)?
            .set_default("max_message_bytes", defaults.max_message_bytes as i64)?;

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(false));
        }

        let raw: RawConfig = builder
            .add_source(Environment::with_prefix("MCP_GATEWAY").try_parsing(true))
            .build()?
            .try_deserialize()?;

        raw.try_into_gateway_config()
            .map_err(|e| ConfigError::Message(e.to_string()))
    }
}

impl RawConfig {
    fn try_into_gateway_config(self) -> Result<GatewayConfig, ConfigError> {
        let bind_addr = self
            .bind_addr
            .parse()
            .map_err(|e| ConfigError::Message(format!("invalid bind_addr: {e}")))?;

        let enabled_transports = self
            .enabled_transports
            .iter()
            .map(|name| parse_transport_type(name))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GatewayConfig {
            bind_addr,
            enabled_transports,
            session_timeout: Duration::from_secs(self.session_timeout_secs),
            sse_keep_alive: Duration::from_secs(self.sse_keep_alive_secs),
            websocket_read_timeout: Duration::from_secs(self.websocket_read_timeout_secs),
            stdio_read_timeout: Duration::from_secs(self.stdio_read_timeout_secs),
            max_message_bytes: self.max_message_bytes,
        })
    }
}

fn parse_transport_type(name: &str) -> Result<TransportType, ConfigError> {
    match name {
        "http" => Ok(TransportType::Http),
        "sse" => Ok(TransportType::Sse),
        "websocket" => Ok(TransportType::WebSocket),
        "streamable" => Ok(TransportType::Streamable),
        "stdio" => Ok(TransportType::Stdio),
        other => Err(ConfigError::Message(format!(
            "unknown transport type in enabled_transports: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_all_five_dialects() {
        let config = GatewayConfig::default();
        assert_eq!(config.enabled_transports.len(), 5);
        assert_eq!(config.session_timeout, Duration::from_secs(30 * 60));
    }

    #[test]
    fn load_with_no_file_falls_back_to_defaults() {
        let config = GatewayConfig::load(None).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[test]
    fn unknown_transport_name_is_rejected() {
        let err = parse_transport_type("carrier-pigeon").unwrap_err();
        assert!(err.to_string().contains("unknown transport type"));
    }
}
