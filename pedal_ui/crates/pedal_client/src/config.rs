use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:9001";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const ENV_WS_URL: &str = "PEDAL_WS_URL";
const ENV_REQUEST_TIMEOUT_MS: &str = "PEDAL_REQUEST_TIMEOUT_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid engine url {value:?}: {source}")]
    InvalidUrl {
        value: String,
        source: url::ParseError,
    },
    #[error("engine url must use ws:// or wss://, got {0}://")]
    UnsupportedScheme(String),
    #[error("invalid request timeout {value:?}: {source}")]
    InvalidTimeout {
        value: String,
        source: std::num::ParseIntError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub ws_url: Url,
    /// How long a request may wait for its reply, including time spent
    /// queued while the handshake is outstanding.
    pub request_timeout: Duration,
    /// Reconnect delays, the last one repeating.
    pub backoff: Vec<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: Url::parse(DEFAULT_WS_URL).expect("default engine url is valid"),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            backoff: [1, 2, 5, 10].into_iter().map(Duration::from_secs).collect(),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `PEDAL_WS_URL` and `PEDAL_REQUEST_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_WS_URL) {
            config = config.with_ws_url(&url)?;
        }
        if let Some(ms) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            let millis = ms
                .trim()
                .parse::<u64>()
                .map_err(|source| ConfigError::InvalidTimeout {
                    value: ms.clone(),
                    source,
                })?;
            config.request_timeout = Duration::from_millis(millis);
        }
        Ok(config)
    }

    pub fn with_ws_url(mut self, value: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
            value: value.to_string(),
            source,
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::UnsupportedScheme(url.scheme().to_string()));
        }
        self.ws_url = url;
        Ok(self)
    }
}
