//! Logging setup for the binary. Library code only emits `tracing` events.

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

use crate::config::DebugConfig;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{value}': unable to build EnvFilter")]
    EnvFilter {
        value: String,
        #[source]
        source: ParseError,
    },
    #[error("telemetry error: {0}")]
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

/// Filter directive when RUST_LOG is unset.
pub fn filter_directive(config: &DebugConfig) -> String {
    if config.enabled {
        "tadash=debug".to_string()
    } else {
        config.log_filter.clone()
    }
}

/// Installs a compact stderr subscriber. RUST_LOG wins over the config.
pub fn init(config: &DebugConfig) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let value = filter_directive(config);
            EnvFilter::try_new(&value).map_err(|source| TelemetryError::EnvFilter { value, source })?
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_overrides_filter() {
        let config = DebugConfig {
            enabled: true,
            log_filter: "warn".to_string(),
        };
        assert_eq!(filter_directive(&config), "tadash=debug");
        assert_eq!(filter_directive(&DebugConfig::default()), "warn");
    }
}
