pub mod receive;
pub mod send;

use std::time::Duration;

use anyhow::{Context, Result};

/// Scans `--flag value` pairs out of `args`, returning the requested flag's
/// value if present. Does not consume/validate unknown flags; each command
/// pulls out the flags it cares about.
pub(crate) fn flag_value(args: &[&str], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| *a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.to_string())
}

pub(crate) fn parse_port(args: &[&str], default: u16) -> Result<u16> {
    match flag_value(args, "--port") {
        Some(raw) => raw.parse().context("--port must be a number"),
        None => Ok(default),
    }
}

pub(crate) fn parse_timeout(args: &[&str], default: Duration) -> Result<Duration> {
    match flag_value(args, "--timeout") {
        Some(raw) => {
            let secs: f64 = raw.parse().context("--timeout must be a number of seconds")?;
            Ok(Duration::from_secs_f64(secs))
        }
        None => Ok(default),
    }
}
