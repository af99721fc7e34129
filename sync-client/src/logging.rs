//! Log output setup for hosts that do not install their own subscriber.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install a `fmt` subscriber filtered by `RUST_LOG`, falling back to the
/// configured directive and then to `info`.
///
/// Returns `false` if a global subscriber was already set.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_refused() {
        let config = LoggingConfig {
            filter: "offline_sync_client=debug".into(),
        };
        // Another test may have installed one already.
        init_logging(&config);
        assert!(!init_logging(&config));
    }
}
