//! Logging setup for the operator CLI.
//!
//! Logs go to stderr so stdout stays machine-readable JSON.

use std::io;

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output for terminals.
    Pretty,
    /// One JSON object per event, for log shipping.
    Json,
}

impl LogFormat {
    /// Reads `LOG_FORMAT`; unset or unrecognised means [`LogFormat::Pretty`].
    #[must_use]
    pub fn from_env() -> Self {
        Self::parse(&std::env::var("LOG_FORMAT").unwrap_or_default())
    }

    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") { Self::Json } else { Self::Pretty }
    }
}

/// Filter used when `RUST_LOG` is unset.
///
/// Each `-v` opens up one more level: bridge debug logs (signing, token cache,
/// request bodies when `verbose` is configured), then everything at trace.
fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "info,pisp_bridge=debug",
        _ => "trace",
    }
}

/// Installs the global subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over `verbosity`. Span close events carry call
/// timings, so every partner call shows up with its duration.
pub fn init_observability(format: LogFormat, verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));
    let layer = fmt::layer().with_span_events(FmtSpan::CLOSE).with_writer(io::stderr);
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry.with(layer).init(),
        LogFormat::Json => registry.with(layer.json().with_span_list(true)).init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(""), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("yaml"), LogFormat::Pretty);
    }

    #[test]
    fn test_default_filter_by_verbosity() {
        assert_eq!(default_filter(0), "info");
        assert_eq!(default_filter(1), "info,pisp_bridge=debug");
        assert_eq!(default_filter(2), "trace");
        assert_eq!(default_filter(u8::MAX), "trace");

        for verbosity in [0, 1, 2] {
            assert!(EnvFilter::try_new(default_filter(verbosity)).is_ok());
        }
    }
}
