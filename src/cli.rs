//! Command-line interface.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::config::{load_settings, PayloadSource, ServerConfig, Settings};
use crate::lifecycle::StartupError;
use crate::resilience::parse_timeout;

const EXAMPLES: &str = "\
Examples:
  shh foo              Serve the string \"foo\" on the local LAN for 1 minute or until it is accessed.
  shh foo --no-stop    Serve the string \"foo\" on the local LAN for 1 minute.
  shh -f foo.txt -p    Serve the file \"foo.txt\" on the local LAN and public Internet for 1 minute.
  shh foo -t never     Serve the string \"foo\" until it is accessed, however long that takes.";

#[derive(Debug, Parser)]
#[command(name = "shh", version)]
#[command(
    about = "Run a short-lived local server to quickly share information with others.",
    after_help = EXAMPLES
)]
pub struct Cli {
    /// Share the indicated information.
    #[arg(conflicts_with = "file")]
    pub secret: Option<String>,

    /// Share the contents of the indicated file.
    #[arg(short, long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Shut down the server after the first successful request is served (default).
    #[arg(short, long, overrides_with = "no_stop")]
    pub stop: bool,

    /// Keep serving after the first successful request.
    #[arg(long, overrides_with = "stop")]
    pub no_stop: bool,

    /// Shut down the server after the indicated time has elapsed
    /// (milliseconds, "30s", "5 minutes", or "never").
    #[arg(short, long, default_value = "1 minute", value_name = "DURATION")]
    pub timeout: String,

    /// Make the server accessible to the public through a tunnel.
    #[arg(short, long)]
    pub public: bool,

    /// Settings file (TOML).
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Build the immutable server config from the parsed arguments.
    pub fn into_config(self) -> Result<ServerConfig, StartupError> {
        let settings = match &self.config {
            Some(path) => load_settings(path)?,
            None => Settings::default(),
        };
        let timeout = parse_timeout(&self.timeout)?;
        let payload_source = PayloadSource::from_parts(self.secret, self.file)
            .ok_or(StartupError::ConflictingSources)?;

        Ok(ServerConfig {
            payload_source,
            stop_on_first_request: !self.no_stop,
            timeout,
            public: self.public,
            settings,
        })
    }
}
