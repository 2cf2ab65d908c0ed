//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Map `-v` counts to a default filter
//! - Format fatal errors as a single line
//!
//! # Design Decisions
//! - `RUST_LOG` always wins over `-v`
//! - Error sources are appended to the one-line message; the full Debug
//!   form is only logged at debug level

use std::error::Error;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter for a verbosity level.
pub fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "shh=info",
        1 => "shh=debug,tower_http=debug",
        _ => "shh=trace,tower_http=trace",
    }
}

/// Install the global subscriber.
pub fn init(verbosity: u8) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(verbosity).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(verbosity > 0))
        .init();
}

/// `error: cause: cause` on one line.
pub fn error_chain(err: &dyn Error) -> String {
    let mut line = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        line.push_str(": ");
        line.push_str(&cause.to_string());
        source = cause.source();
    }
    line
}

/// Report a fatal error: one line at error level, full context at debug.
pub fn report_fatal(err: &dyn Error) {
    tracing::error!("{}", error_chain(err));
    tracing::debug!(error = ?err, "Error context");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::DataLoadError;
    use crate::lifecycle::StartupError;

    #[test]
    fn chain_includes_every_cause() {
        let err = StartupError::from(DataLoadError::NotFound {
            path: "/nonexistent".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
        });
        assert_eq!(
            error_chain(&err),
            "failed to load data: file /nonexistent does not exist or is not readable: No such file or directory"
        );
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(default_filter(0), "shh=info");
        assert!(default_filter(1).starts_with("shh=debug"));
        assert!(default_filter(5).starts_with("shh=trace"));
    }
}
