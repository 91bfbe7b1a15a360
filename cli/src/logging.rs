//! # Logging
//!
//! `wepay` prints command results as JSON on stdout, so every log event goes
//! to stderr. By default the binary and both library crates log at `info`:
//! certificate refreshes, created batches and verification failures show up,
//! per-request signing detail does not. Set `RUST_LOG` to change that, e.g.
//! `RUST_LOG=wepay_protocol=debug` to see each signed exchange.
//!
//! `--log-format json` switches to one JSON object per event for log
//! shippers; `pretty` is the default.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset: the `wepay` binary plus the
/// `wepay_protocol` and `wepay_transfers` crates, all at `info`.
pub const DEFAULT_FILTER: &str = "wepay=info,wepay_protocol=info,wepay_transfers=info";

/// Shape of each log line on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// `"json"` in any case selects JSON; anything else falls back to pretty
    /// rather than failing the command over a logging flag.
    pub fn from_str_lossy(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Install the global subscriber. Call once, before the first API call.
pub fn init_logging(default_filter: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            )
            .init(),
    }

    tracing::debug!(?format, "logging initialized");
}
