//! Tracing setup shared by both binaries.
//!
//! Output always goes to stderr: the worker's stdout carries job responses.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset: the library plus both binaries.
pub const DEFAULT_FILTER: &str = "heartmula_jobs=info,heartmula=info,heartmula_worker=info";

/// Installs the global subscriber. Later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_is_harmless() {
        init_logging();
        init_logging();
        tracing::info!("logging initialized");
    }

    #[test]
    fn default_filter_covers_binaries() {
        for target in ["heartmula_jobs", "heartmula", "heartmula_worker"] {
            let directive = format!("{}=info", target);
            assert!(
                DEFAULT_FILTER.split(',').any(|d| d == directive),
                "{} missing from default filter",
                target
            );
        }
        assert!(tracing_subscriber::EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
