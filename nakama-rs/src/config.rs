//! Client configuration.

use std::env;
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 7350;
pub const DEFAULT_SERVER_KEY: &str = "defaultkey";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings shared by the REST and realtime clients.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub ssl: bool,
    /// Key used for HTTP basic auth on authentication calls.
    pub server_key: String,
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            ssl: false,
            server_key: DEFAULT_SERVER_KEY.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `NAKAMA_HOST`, `NAKAMA_PORT`, `NAKAMA_SSL` and
    /// `NAKAMA_SERVER_KEY`. Values that do not parse are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("NAKAMA_HOST").filter(|h| !h.is_empty()) {
            config.host = host;
        }
        if let Some(port) = lookup("NAKAMA_PORT") {
            match port.parse() {
                Ok(port) => config.port = port,
                Err(_) => tracing::warn!("ignoring NAKAMA_PORT={}", port),
            }
        }
        if let Some(ssl) = lookup("NAKAMA_SSL") {
            config.ssl = matches!(ssl.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(key) = lookup("NAKAMA_SERVER_KEY") {
            config.server_key = key;
        }

        config
    }

    pub fn http_base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom("timeout must be a non-negative number of seconds"));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}
