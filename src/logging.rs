//! Diagnostic logging setup for the binary.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::fmt;

/// Environment variable holding a `tracing` filter, e.g. `datetidy=debug`.
pub const LOG_ENV_VAR: &str = "DATETIDY_LOG";

/// Builds the filter: `DATETIDY_LOG` if set and valid, otherwise `default_level`.
pub fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Installs a stderr subscriber so log lines don't mix with console output.
///
/// Does nothing if a global subscriber is already set.
pub fn init_logger(default_level: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .with(build_filter(default_level))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_falls_back_on_bad_level() {
        let filter = build_filter("not a [valid filter");
        assert!(!filter.to_string().is_empty());
    }

    #[test]
    fn test_init_logger_twice_is_harmless() {
        init_logger("info");
        init_logger("debug");
    }
}
