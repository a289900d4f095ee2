//! Logging initialization.
//!
//! The library only emits `tracing` events; embedders that want them printed
//! call [`init`] once at startup.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, util::TryInitError, EnvFilter};

use crate::Config;

/// Install a global tracing subscriber.
///
/// * `verbosity` - 0 = INFO, 1 = DEBUG, 2+ = TRACE
/// * `json` - If true, output JSON lines to stderr
///
/// `RUST_LOG` is honoured; the verbosity level is added as an `amdmid`
/// directive on top of it. Fails if a global subscriber is already set.
pub fn init(verbosity: u8, json: bool) -> Result<(), TryInitError> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"))
        .add_directive(format!("amdmid_core={level}").parse().unwrap_or_else(|_| level.into()));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        subscriber
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    }
}

/// Install a global subscriber using the verbosity settings of `config`.
pub fn init_from_config(config: &Config) -> Result<(), TryInitError> {
    init(config.verbosity, config.json_logs)
}
