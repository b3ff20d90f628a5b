//! Tracing setup for hosts and tests that don't install their own subscriber.
//!
//! # Usage
//!
//! ```ignore
//! use weaver_media::telemetry::{self, TelemetryConfig};
//!
//! telemetry::init(TelemetryConfig::from_env());
//! tracing::info!("editor ready");
//! ```

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Console log level (default: INFO, DEBUG in debug builds)
    pub console_level: Level,
    /// Include the event target (module path) in output.
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl TelemetryConfig {
    /// Default config. `RUST_LOG`, when set, overrides `console_level` at init.
    pub fn from_env() -> Self {
        let console_level = if cfg!(debug_assertions) {
            Level::DEBUG
        } else {
            Level::INFO
        };

        Self {
            console_level,
            with_target: true,
        }
    }
}

/// Install a compact console subscriber.
///
/// Returns false when a global subscriber was already set.
pub fn init(config: TelemetryConfig) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.console_level.as_str().to_lowercase()));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(config.with_target)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let _ = init(TelemetryConfig::default());
        assert!(!init(TelemetryConfig::default()));
    }
}
