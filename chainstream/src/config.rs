//! Client configuration.

use std::time::Duration;

use crate::types::Error;

/// Environment variable read by [`Config::from_env`].
pub const ENDPOINT_ENV: &str = "CHAINSTREAM_WSS_ENDPOINT";

pub(crate) const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Timers used by a subscription session.
///
/// The defaults match the ChainStream service; tests shorten them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    /// Interval between keepalive pings while streaming.
    pub keepalive_interval: Duration,
    /// Fixed delay before reconnecting after a transient failure.
    pub reconnect_delay: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// ChainStream WebSocket endpoint, e.g.
    /// `wss://chainstream.api.syndica.io/api-key/<KEY>`.
    pub wss_api_endpoint: String,
    /// Session timers. `None` uses [`TimingConfig::default`].
    pub timing: Option<TimingConfig>,
}

impl Config {
    pub fn new(wss_api_endpoint: impl Into<String>) -> Self {
        Self {
            wss_api_endpoint: wss_api_endpoint.into(),
            timing: None,
        }
    }

    /// Build a config from the `CHAINSTREAM_WSS_ENDPOINT` environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let endpoint = std::env::var(ENDPOINT_ENV)
            .map_err(|e| Error::Config(format!("{ENDPOINT_ENV}: {e}")))?;
        Self::from_endpoint(&endpoint)
    }

    fn from_endpoint(endpoint: &str) -> Result<Self, Error> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(Error::Config(format!("{ENDPOINT_ENV} is empty")));
        }
        Ok(Self::new(endpoint))
    }

    pub(crate) fn timing(&self) -> TimingConfig {
        self.timing.unwrap_or_default()
    }
}
