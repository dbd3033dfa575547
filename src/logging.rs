//! Diagnostic logging
//!
//! Diagnostics go through `tracing` and are written to stderr. Status lines
//! meant for display go through an [`crate::events::EventSink`] instead, so
//! the two never interleave on stdout.

use tracing_subscriber::{fmt, EnvFilter};

/// How much the crate logs when `RUST_LOG` does not say otherwise
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Connections, transfers and failures
    #[default]
    Info,
    /// Per-message and per-poll detail
    Debug,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Info => "peer_chat=info",
            LogLevel::Debug => "peer_chat=debug",
        }
    }
}

/// Installs the global subscriber
///
/// `RUST_LOG` takes precedence over `level`. Calling this again is a no-op.
///
/// ```no_run
/// use peer_chat::logging::{init_logging, LogLevel};
///
/// init_logging(LogLevel::Info);
/// ```
pub fn init_logging(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_line_number(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_scopes_to_crate() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
        assert_eq!(LogLevel::Info.directive(), "peer_chat=info");
        assert_eq!(LogLevel::Debug.directive(), "peer_chat=debug");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging(LogLevel::Debug);
        init_logging(LogLevel::Info);
    }
}
