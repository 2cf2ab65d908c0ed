//! Settings validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: &Settings → Result<(), Vec<ValidationError>>
//! - Runs before the settings are accepted

use std::fmt;
use std::net::SocketAddr;

use regex::Regex;

use crate::config::schema::Settings;

/// A single semantic problem in the settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_settings(settings: &Settings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut reject = |field: &'static str, message: String| {
        errors.push(ValidationError { field, message })
    };

    if settings.server.max_connections == 0 {
        reject("server.max_connections", "must be greater than zero".into());
    }
    if settings.server.header_read_timeout_secs == 0 {
        reject("server.header_read_timeout_secs", "must be greater than zero".into());
    }
    if settings.tunnel.binary.trim().is_empty() {
        reject("tunnel.binary", "must not be empty".into());
    }
    if settings.tunnel.api_address.parse::<SocketAddr>().is_err() {
        reject(
            "tunnel.api_address",
            format!("`{}` is not a socket address", settings.tunnel.api_address),
        );
    }
    if settings.tunnel.connect_timeout_secs == 0 {
        reject("tunnel.connect_timeout_secs", "must be greater than zero".into());
    }
    for pattern in &settings.security.extra_bot_patterns {
        if let Err(e) = Regex::new(pattern) {
            reject("security.extra_bot_patterns", format!("`{}`: {}", pattern, e));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_settings(&Settings::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut settings = Settings::default();
        settings.server.max_connections = 0;
        settings.tunnel.api_address = "localhost".into();
        settings.security.extra_bot_patterns = vec!["(unclosed".into()];

        let errors = validate_settings(&settings).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "server.max_connections",
                "tunnel.api_address",
                "security.extra_bot_patterns"
            ]
        );
    }
}
