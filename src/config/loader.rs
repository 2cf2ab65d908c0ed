//! Settings loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::Settings;
use crate::config::validation::{validate_settings, ValidationError};

/// Error type for settings loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read settings: {}", e),
            ConfigError::Parse(e) => write!(f, "failed to parse settings: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "invalid settings: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Validation(_) => None,
        }
    }
}

/// Load and validate settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_settings(&content)
}

/// Parse and validate settings from TOML text.
pub fn parse_settings(content: &str) -> Result<Settings, ConfigError> {
    let settings: Settings = toml::from_str(content).map_err(ConfigError::Parse)?;
    validate_settings(&settings).map_err(ConfigError::Validation)?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let settings = parse_settings("").unwrap();
        assert_eq!(settings.tunnel.api_address, "127.0.0.1:4040");
    }

    #[test]
    fn rejects_unparseable_toml() {
        assert!(matches!(parse_settings("[server"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn rejects_invalid_values() {
        let err = parse_settings("[tunnel]\nconnect_timeout_secs = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
        assert!(err.to_string().contains("tunnel.connect_timeout_secs"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_settings(Path::new("/nonexistent/shh.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
