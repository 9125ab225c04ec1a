//! Telemetry initialization.
//!
//! Controlled by `REGIONMERGE_LOG` (an `EnvFilter` directive such as
//! `regionmerge=debug`):
//! - unset → warnings and errors only
//! - `--log-format text` → human-readable events on stderr
//! - `--log-format json` → JSON events plus span close events on stderr
//!
//! stdout is reserved for command output.

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "REGIONMERGE_LOG";

/// Shape of log events on stderr.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Compact human-readable lines.
    #[default]
    Text,
    /// One JSON object per event; span timings on close.
    Json,
}

/// Install the global subscriber. Call once, early in `main()`.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE),
            )
            .init(),
    }
}
