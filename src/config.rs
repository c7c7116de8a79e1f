use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::{AppError, Result};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const OUTBOUND_QUEUE_ENV: &str = "RELAY_OUTBOUND_QUEUE";
pub const STATS_INTERVAL_ENV: &str = "RELAY_STATS_INTERVAL_SECS";
pub const PATH_ENV: &str = "RELAY_PATH";

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_OUTBOUND_QUEUE: usize = 100;
pub const DEFAULT_PATH: &str = "/";

/// Runtime parameters of the relay, sourced from the process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub listen_addr: SocketAddr,
    /// Request path of the relay endpoint; handshakes on other paths get a 404.
    pub path: String,
    /// Capacity of each connection's outbound queue.
    pub outbound_queue: usize,
    /// Period of the stats log line; `None` disables it.
    pub stats_interval: Option<Duration>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            path: DEFAULT_PATH.to_string(),
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
            stats_interval: None,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Unset or blank keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let host = match get(HOST_ENV) {
            Some(raw) => raw
                .parse::<IpAddr>()
                .map_err(|e| AppError::Config(format!("{HOST_ENV}={raw:?}: {e}")))?,
            None => defaults.listen_addr.ip(),
        };

        let port = match get(PORT_ENV) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| AppError::Config(format!("{PORT_ENV}={raw:?}: {e}")))?,
            None => defaults.listen_addr.port(),
        };

        let path = match get(PATH_ENV) {
            Some(raw) if raw.starts_with('/') => raw,
            Some(raw) => {
                return Err(AppError::Config(format!(
                    "{PATH_ENV}={raw:?}: must start with '/'"
                )))
            }
            None => defaults.path,
        };

        let outbound_queue = match get(OUTBOUND_QUEUE_ENV) {
            Some(raw) => match raw.parse::<usize>() {
                Ok(0) => {
                    return Err(AppError::Config(format!(
                        "{OUTBOUND_QUEUE_ENV} must be greater than zero"
                    )))
                }
                Ok(n) => n,
                Err(e) => {
                    return Err(AppError::Config(format!("{OUTBOUND_QUEUE_ENV}={raw:?}: {e}")))
                }
            },
            None => defaults.outbound_queue,
        };

        let stats_interval = match get(STATS_INTERVAL_ENV) {
            Some(raw) => {
                let secs = raw
                    .parse::<u64>()
                    .map_err(|e| AppError::Config(format!("{STATS_INTERVAL_ENV}={raw:?}: {e}")))?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            listen_addr: SocketAddr::new(host, port),
            path,
            outbound_queue,
            stats_interval,
        })
    }

    /// build with provided listen address
    pub fn with_listen_addr(mut self, listen_addr: SocketAddr) -> Self {
        self.listen_addr = listen_addr;
        self
    }

    /// build with provided endpoint path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// build with provided outbound queue capacity
    pub fn with_outbound_queue(mut self, outbound_queue: usize) -> Self {
        self.outbound_queue = outbound_queue.max(1);
        self
    }
}
