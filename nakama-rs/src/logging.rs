//! Logging setup.
//!
//! The SDK itself only emits `tracing` events. Applications that do not install
//! their own subscriber can call [`init_logging`] once at startup.
//!
//! ```rust,no_run
//! use nakama_rs::logging::{init_logging, LogConfig};
//!
//! init_logging(LogConfig::default().with_level("nakama_rs=debug"));
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration.
#[derive(Clone, Debug)]
pub struct LogConfig {
    /// Filter directive (e.g. "info", "nakama_rs=debug,nakama_ws=warn").
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Output logs as JSON.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

impl LogConfig {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }
}

/// Install a global fmt subscriber.
///
/// Returns false if a global subscriber was already set.
pub fn init_logging(config: LogConfig) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.json {
        let fmt_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true);
        registry.with(fmt_layer).try_init().is_ok()
    } else {
        let fmt_layer = fmt::layer().with_target(true).compact();
        registry.with(fmt_layer).try_init().is_ok()
    }
}
