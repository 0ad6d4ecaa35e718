//! Tracing subscriber setup for the `shield` binary.

use crate::constants::{DEFAULT_LOG_LEVEL, LOG_FORMAT_JSON, LOG_FORMAT_TEXT};
use crate::errors::{AppError, AppResult};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level is `debug` with `verbose` and
/// `info` without. Logs go to stderr so command output on stdout stays clean.
///
/// # Errors
///
/// Returns `AppError::Config` for an unknown format or if a subscriber is
/// already installed.
pub fn init(format: &str, verbose: bool) -> AppResult<()> {
    let default_level = if verbose { "debug" } else { DEFAULT_LOG_LEVEL };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LOG_FORMAT_JSON => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LOG_FORMAT_TEXT => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init(),
        other => {
            return Err(AppError::Config(format!(
                "Unknown log format '{}'; expected '{}' or '{}'",
                other, LOG_FORMAT_TEXT, LOG_FORMAT_JSON
            )))
        }
    };

    result.map_err(|e| AppError::Config(format!("Failed to initialize logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_format_is_rejected() {
        match init("xml", false) {
            Err(AppError::Config(msg)) => assert!(msg.contains("xml")),
            other => panic!("Expected config error, got {:?}", other),
        }
    }
}
