//! Tracing setup shared by the dyncheck binaries.
//!
//! Log records always go to stderr; stdout is reserved for command output.

use std::env::var;
use std::io;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with `level` as the default directive.
///
/// `RUST_LOG` still overrides the default, and `RUST_LOG_FORMAT=json`
/// switches to one JSON object per line.
pub fn init_with_level(level: LevelFilter) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_format = var("RUST_LOG_FORMAT").unwrap_or_default();

    let log_layer = match log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_filter(env_filter)
            .boxed(),
        "" | "compact" => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(io::stderr)
            .with_filter(env_filter)
            .boxed(),
        other => {
            let layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(io::stderr)
                .with_filter(env_filter)
                .boxed();
            let _ = tracing_subscriber::registry().with(layer).try_init();
            warn!("Unknown RUST_LOG_FORMAT {other:?}, using compact output");
            return;
        }
    };

    // a second init (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::registry().with(log_layer).try_init();
}

/// Map `-v`/`-q` counts onto a default level
pub fn level_from_verbosity(verbose: u8, quiet: u8) -> LevelFilter {
    match i16::from(verbose) - i16::from(quiet) {
        i16::MIN..=-2 => LevelFilter::ERROR,
        -1 => LevelFilter::WARN,
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_verbosity() {
        assert_eq!(level_from_verbosity(0, 0), LevelFilter::INFO);
        assert_eq!(level_from_verbosity(1, 0), LevelFilter::DEBUG);
        assert_eq!(level_from_verbosity(3, 0), LevelFilter::TRACE);
        assert_eq!(level_from_verbosity(0, 1), LevelFilter::WARN);
        assert_eq!(level_from_verbosity(0, 5), LevelFilter::ERROR);
        assert_eq!(level_from_verbosity(2, 1), LevelFilter::DEBUG);
    }
}
