//! Shutdown timeout parsing.
//!
//! # Responsibilities
//! - Accept bare millisecond counts ("1500")
//! - Accept human durations ("30s", "1 minute", "1.5h")
//! - Recognize the explicit "never" sentinel
//! - Produce a human-readable form for operator logs
//!
//! # Design Decisions
//! - Only an explicit sentinel disables the timeout; invalid input is an error
//! - Zero is rejected: it would shut the server down before anyone could use it
//! - The readable form picks the largest unit that divides the value exactly

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

const SECOND: u64 = 1_000;
const MINUTE: u64 = 60 * SECOND;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Inputs that disable the timeout.
const SENTINELS: &[&str] = &["infinity", "never", "none"];

/// The given duration could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid timeout: {input}")]
pub struct InvalidTimeoutError {
    pub input: String,
}

/// Parsed shutdown timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timeout {
    /// Never shut down because of time.
    Infinite,
    /// Shut down after `millis` milliseconds.
    Finite { millis: u64, human: String },
}

impl Timeout {
    /// Build a finite timeout from a millisecond count.
    pub fn from_millis(millis: u64) -> Self {
        Timeout::Finite {
            millis,
            human: humanize(millis),
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Timeout::Infinite => None,
            Timeout::Finite { millis, .. } => Some(Duration::from_millis(*millis)),
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, Timeout::Infinite)
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeout::Infinite => write!(f, "indefinitely"),
            Timeout::Finite { human, .. } => write!(f, "{}", human),
        }
    }
}

fn duration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^(\d+(?:\.\d+)?|\.\d+)\s*(milliseconds?|msecs?|ms|seconds?|secs?|s|minutes?|mins?|m|hours?|hrs?|h|days?|d)?$",
        )
        .expect("duration pattern is valid")
    })
}

fn unit_millis(unit: &str) -> Option<u64> {
    match unit.to_ascii_lowercase().as_str() {
        "" | "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => Some(1),
        "s" | "sec" | "secs" | "second" | "seconds" => Some(SECOND),
        "m" | "min" | "mins" | "minute" | "minutes" => Some(MINUTE),
        "h" | "hr" | "hrs" | "hour" | "hours" => Some(HOUR),
        "d" | "day" | "days" => Some(DAY),
        _ => None,
    }
}

/// Parse a timeout given on the command line.
pub fn parse_timeout(input: &str) -> Result<Timeout, InvalidTimeoutError> {
    let invalid = || InvalidTimeoutError {
        input: input.to_string(),
    };
    let trimmed = input.trim();

    if SENTINELS.iter().any(|s| trimmed.eq_ignore_ascii_case(s)) {
        return Ok(Timeout::Infinite);
    }

    let millis = if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        trimmed.parse::<u64>().map_err(|_| invalid())?
    } else {
        let captures = duration_pattern().captures(trimmed).ok_or_else(invalid)?;
        let amount: f64 = captures[1].parse().map_err(|_| invalid())?;
        let unit = captures.get(2).map(|m| m.as_str()).unwrap_or("");
        let factor = unit_millis(unit).ok_or_else(invalid)?;

        let value = (amount * factor as f64).round();
        if !value.is_finite() || value >= u64::MAX as f64 {
            return Err(invalid());
        }
        value as u64
    };

    if millis == 0 {
        return Err(invalid());
    }

    Ok(Timeout::from_millis(millis))
}

/// Render a millisecond count as "<n> <unit>" using the largest exact unit.
fn humanize(millis: u64) -> String {
    let units = [
        (DAY, "day"),
        (HOUR, "hour"),
        (MINUTE, "minute"),
        (SECOND, "second"),
    ];

    let (count, unit) = units
        .iter()
        .find(|(size, _)| millis >= *size && millis % size == 0)
        .map(|(size, name)| (millis / size, *name))
        .unwrap_or((millis, "millisecond"));

    if count == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", count, unit)
    }
}
