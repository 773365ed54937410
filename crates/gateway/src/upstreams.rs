//! A [`UpstreamRegistry`] backed by a static table loaded from an optional
//! TOML file, the same `config`-crate layering [`gateway_server::GatewayConfig`]
//! itself uses.
//!
//! ```toml
//! [upstreams.default]
//! protocol = "http"
//! url = "http://localhost:3000/rpc"
//!
//! [upstreams.search]
//! command = "search-mcp-server"
//! args = ["--stdio"]
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use config::{Config, ConfigError, File};
use gateway_server::{UpstreamDescriptor, UpstreamEndpoint, UpstreamRegistry};
use gateway_transport_traits::TransportType;
use serde::Deserialize;

/// The default upstream key `gateway-server`'s bare (non-`/servers/{id}`)
/// routes resolve.
const DEFAULT_KEY: &str = "default";

#[derive(Debug, Clone, Deserialize)]
struct RawUpstream {
    protocol: Option<String>,
    url: Option<String>,
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    working_dir: Option<String>,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    max_retries: u32,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

impl RawUpstream {
    fn try_into_descriptor(self) -> Result<UpstreamDescriptor, ConfigError> {
        let endpoint = match (self.url, self.command) {
            (Some(url), None) => {
                let protocol = match self.protocol.as_deref() {
                    Some("http") | None => TransportType::Http,
                    Some("sse") => TransportType::Sse,
                    Some("websocket") => TransportType::WebSocket,
                    Some("streamable") => TransportType::Streamable,
                    Some(other) => return Err(ConfigError::Message(format!("unknown upstream protocol: {other}"))),
                };
                UpstreamEndpoint::Url { protocol, url }
            }
            (None, Some(command)) => {
                UpstreamEndpoint::Command { command, args: self.args, env: self.env.into_iter().collect(), working_dir: self.working_dir }
            }
            (Some(_), Some(_)) => return Err(ConfigError::Message("upstream entry has both `url` and `command`".to_string())),
            (None, None) => return Err(ConfigError::Message("upstream entry needs either `url` or `command`".to_string())),
        };
        Ok(UpstreamDescriptor { endpoint, timeout: Duration::from_secs(self.timeout_secs), max_retries: self.max_retries })
    }
}

/// Resolves `{server_id}` against a fixed map built at startup.
#[derive(Debug)]
pub struct StaticUpstreamRegistry {
    upstreams: HashMap<String, UpstreamDescriptor>,
}

impl StaticUpstreamRegistry {
    /// A registry with only the `default` entry, pointing at a local
    /// JSON-RPC/HTTP server. Suitable for a first run; override with
    /// `load(...)` for anything beyond a single local upstream.
    pub fn single_default() -> Self {
        let mut upstreams = HashMap::new();
        upstreams.insert(
            DEFAULT_KEY.to_string(),
            UpstreamDescriptor {
                endpoint: UpstreamEndpoint::Url { protocol: TransportType::Http, url: "http://localhost:3000/rpc".to_string() },
                timeout: Duration::from_secs(default_timeout_secs()),
                max_retries: default_max_retries(),
            },
        );
        Self { upstreams }
    }

    /// Load `[upstreams.<id>]` tables from an optional TOML file. Falls back
    /// to [`Self::single_default`] if `config_path` is absent or defines no
    /// `default` entry.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let Some(path) = config_path else {
            return Ok(Self::single_default());
        };

        let built = Config::builder().add_source(File::with_name(path).required(false)).build()?;
        let mut tables: HashMap<String, HashMap<String, RawUpstream>> = built.try_deserialize().unwrap_or_default();
        let raw = tables.remove("upstreams").unwrap_or_default();

        if raw.is_empty() {
            return Ok(Self::single_default());
        }

        let mut upstreams = HashMap::with_capacity(raw.len());
        for (id, entry) in raw {
            upstreams.insert(id, entry.try_into_descriptor()?);
        }
        Ok(Self { upstreams })
    }
}

impl UpstreamRegistry for StaticUpstreamRegistry {
    fn resolve<'a>(&'a self, server_id: &'a str) -> Pin<Box<dyn Future<Output = Option<UpstreamDescriptor>> + Send + 'a>> {
        Box::pin(async move { self.upstreams.get(server_id).cloned() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn single_default_resolves_the_default_key() {
        let registry = StaticUpstreamRegistry::single_default();
        assert!(registry.resolve(DEFAULT_KEY).await.is_some());
    }

    #[tokio::test]
    async fn single_default_has_no_other_entries() {
        let registry = StaticUpstreamRegistry::single_default();
        assert!(registry.resolve("search").await.is_none());
    }

    #[test]
    fn an_entry_with_neither_url_nor_command_is_rejected() {
        let raw = RawUpstream {
            protocol: None,
            url: None,
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
            timeout_secs: 30,
            max_retries: 3,
        };
        assert!(raw.try_into_descriptor().is_err());
    }

    #[test]
    fn load_with_no_file_falls_back_to_single_default() {
        let registry = StaticUpstreamRegistry::load(None).unwrap();
        assert_eq!(registry.upstreams.len(), 1);
    }
}
