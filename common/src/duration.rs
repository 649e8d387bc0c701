// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The codgate authors.

//! Human-readable durations for configuration values.
//!
//! Block TTLs and cookie lifetimes are configured as strings such as `24h`,
//! `30d`, `1h30m` or plain seconds (`86400`). Units are case-insensitive:
//! `d` (days), `h` (hours), `m` (minutes), `s` (seconds).
//!
//! ```
//! use codgate_common::duration::parse_duration;
//! use std::time::Duration;
//!
//! assert_eq!(parse_duration("24h").unwrap(), Duration::from_secs(86_400));
//! assert_eq!(parse_duration("1d12h").unwrap(), Duration::from_secs(129_600));
//! assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
//! ```

use std::fmt;
use std::time::Duration;

const UNITS: [(char, u64); 4] = [('d', 86_400), ('h', 3_600), ('m', 60), ('s', 1)];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDurationError {
    input: String,
    reason: String,
}

impl ParseDurationError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ParseDurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid duration '{}': {}", self.input, self.reason)
    }
}

impl std::error::Error for ParseDurationError {}

fn unit_seconds(unit: char) -> Option<u64> {
    let unit = unit.to_ascii_lowercase();
    UNITS.iter().find(|(u, _)| *u == unit).map(|(_, secs)| *secs)
}

/// Parse `"30d"`, `"1h30m"`, `"45s"` or raw seconds into a [`Duration`].
pub fn parse_duration(input: &str) -> Result<Duration, ParseDurationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseDurationError::new(input, "empty string"));
    }

    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total: u64 = 0;
    let mut digits = String::new();

    for c in trimmed.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let Some(multiplier) = unit_seconds(c) else {
            return Err(ParseDurationError::new(
                input,
                format!("unexpected character '{c}' (units: d, h, m, s)"),
            ));
        };
        if digits.is_empty() {
            return Err(ParseDurationError::new(
                input,
                format!("unit '{c}' has no number"),
            ));
        }

        let amount: u64 = digits
            .parse()
            .map_err(|_| ParseDurationError::new(input, format!("number '{digits}' too large")))?;
        digits.clear();

        total = amount
            .checked_mul(multiplier)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| ParseDurationError::new(input, "duration overflow"))?;
    }

    if !digits.is_empty() {
        return Err(ParseDurationError::new(
            input,
            format!("trailing number '{digits}' has no unit"),
        ));
    }

    Ok(Duration::from_secs(total))
}

/// Render whole seconds of `duration` in the same notation `parse_duration` reads.
pub fn format_duration(duration: Duration) -> String {
    let mut remaining = duration.as_secs();
    if remaining == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, secs) in UNITS {
        let count = remaining / secs;
        if count > 0 {
            out.push_str(&format!("{count}{unit}"));
            remaining %= secs;
        }
    }
    out
}

/// Read a duration from `key`, falling back to `default` when unset or invalid.
pub fn env_duration(key: &str, default: Duration) -> Duration {
    env_duration_opt(key).unwrap_or(default)
}

/// Read an optional duration from `key`. Unset, empty and unparseable values
/// are all `None`; an unparseable value is logged.
pub fn env_duration_opt(key: &str) -> Option<Duration> {
    let raw = std::env::var(key).ok().filter(|v| !v.trim().is_empty())?;
    match parse_duration(&raw) {
        Ok(d) => Some(d),
        Err(e) => {
            tracing::warn!(%key, "ignoring {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn parses_single_units() {
        assert_eq!(parse_duration("30d").unwrap(), secs(30 * 86_400));
        assert_eq!(parse_duration("24h").unwrap(), secs(86_400));
        assert_eq!(parse_duration("15m").unwrap(), secs(900));
        assert_eq!(parse_duration("45s").unwrap(), secs(45));
        assert_eq!(parse_duration("2H").unwrap(), secs(7_200));
    }

    #[test]
    fn parses_raw_seconds_and_combinations() {
        assert_eq!(parse_duration("86400").unwrap(), secs(86_400));
        assert_eq!(parse_duration(" 1h30m ").unwrap(), secs(5_400));
        assert_eq!(parse_duration("1d2h3m4s").unwrap(), secs(93_784));
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in ["", "   ", "h", "10x", "1h30", "1.5h", "-3h", "99999999999999999999d"] {
            assert!(parse_duration(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn formats_in_parseable_notation() {
        assert_eq!(format_duration(secs(0)), "0s");
        assert_eq!(format_duration(secs(86_400)), "1d");
        assert_eq!(format_duration(secs(90_061)), "1d1h1m1s");
        assert_eq!(format_duration(Duration::from_millis(5_400_999)), "1h30m");

        let ttl = secs(2 * 86_400 + 7 * 60);
        assert_eq!(parse_duration(&format_duration(ttl)).unwrap(), ttl);
    }

    #[test]
    fn env_lookup_falls_back() {
        let key = "CODGATE_TEST_DURATION_ENV_LOOKUP";
        std::env::remove_var(key);
        assert_eq!(env_duration(key, secs(60)), secs(60));
        assert_eq!(env_duration_opt(key), None);

        std::env::set_var(key, "2h");
        assert_eq!(env_duration(key, secs(60)), secs(7_200));

        std::env::set_var(key, "soon");
        assert_eq!(env_duration(key, secs(60)), secs(60));
        assert_eq!(env_duration_opt(key), None);

        std::env::remove_var(key);
    }
}
