//! Process-wide `tracing` subscriber setup.

use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogFormat;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "stagehand=info";

/// Builds the filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
#[must_use]
pub fn env_filter() -> EnvFilter {
    filter_from(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())
}

fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Builds the subscriber for `format` behind `filter`.
#[must_use]
pub fn subscriber(format: LogFormat, filter: EnvFilter) -> Box<dyn Subscriber + Send + Sync> {
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => Box::new(registry.with(fmt::layer().with_target(false))),
        LogFormat::Json => Box::new(registry.with(fmt::layer().json().with_current_span(false))),
    }
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(format: LogFormat) -> Result<(), TryInitError> {
    subscriber(format, env_filter()).try_init()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_filter_fallback() {
        assert_eq!(filter_from(None).to_string(), DEFAULT_FILTER);
        assert_eq!(filter_from(Some("stagehand=debug")).to_string(), "stagehand=debug");
        assert_eq!(filter_from(Some("stagehand=verbose")).to_string(), DEFAULT_FILTER);
    }

    #[test]
    fn test_subscriber_applies_default_filter() {
        for format in [LogFormat::Text, LogFormat::Json] {
            tracing::subscriber::with_default(subscriber(format, filter_from(None)), || {
                assert!(tracing::enabled!(target: "stagehand::pipeline", Level::INFO));
                assert!(!tracing::enabled!(target: "stagehand::pipeline", Level::DEBUG));
                assert!(!tracing::enabled!(target: "hyper", Level::INFO));
            });
        }
    }
}
