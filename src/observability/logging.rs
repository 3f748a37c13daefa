//! # Logging
//!
//! `tracing-subscriber` setup for binaries embedding the engine.
//!
//! `RUST_LOG` takes precedence; otherwise the filter is built from
//! `EngineConfig::log_level` and scoped to this crate.

use crate::config::EngineConfig;
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber
///
/// Returns `false` if a subscriber was already installed, which is not an
/// error: hosts and tests may install their own first.
pub fn init_logging(config: &EngineConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&config.log_level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = if config.log_format.eq_ignore_ascii_case("json") {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.with_ansi(config.log_enable_color).try_init()
    };
    result.is_ok()
}

fn default_directive(level: &str) -> String {
    format!("env_group_engine={},egctl={}", level.to_lowercase(), level.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_is_scoped_to_crate() {
        assert_eq!(
            default_directive("INFO"),
            "env_group_engine=info,egctl=info"
        );
    }

    #[test]
    fn test_second_init_is_not_an_error() {
        let config = EngineConfig::default();
        init_logging(&config);
        assert!(!init_logging(&config));
    }
}
