//! Tolerant parser for `DURATION`/`TRIGGER` values.
//!
//! Real-world senders emit durations like `P1S2M3H`, `1DT` or `P2W3600S`. Everything that the
//! permissive pattern accepts is interpreted component by component; anything else is handed to
//! the strict RFC 5545 `dur-value` parser so its error reaches the caller.

use regex::{Captures, Regex};
use std::{fmt, sync::LazyLock};
use thiserror::Error;

const DAYS_PER_WEEK: i64 = 7;
const SECONDS_PER_DAY: i64 = 86_400;
const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_MINUTE: i64 = 60;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum DurationError {
    #[error("`{0}` is not a valid duration")]
    Invalid(String),
    #[error("duration `{0}` is out of range")]
    OutOfRange(String),
}

/// Result of parsing a duration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TemporalAmount {
    /// Whole calendar days. Stays aligned to local midnight across daylight saving transitions.
    Period { days: i64 },
    /// Exact length of time.
    Duration(chrono::Duration),
}

impl TemporalAmount {
    /// Length in seconds, counting a calendar day as 24 hours.
    pub fn num_seconds(&self) -> i64 {
        match self {
            TemporalAmount::Period { days } => days * SECONDS_PER_DAY,
            TemporalAmount::Duration(duration) => duration.num_seconds(),
        }
    }
}

impl fmt::Display for TemporalAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TemporalAmount::Period { days } => {
                let sign = if days < 0 { "-" } else { "" };
                write!(f, "{sign}P{}D", days.unsigned_abs())
            }
            TemporalAmount::Duration(duration) => {
                let seconds = duration.num_seconds();
                let sign = if seconds < 0 { "-" } else { "" };
                let seconds = seconds.unsigned_abs();
                if seconds == 0 {
                    return write!(f, "PT0S");
                }
                write!(f, "{sign}PT")?;
                let (hours, minutes, seconds) =
                    (seconds / 3600, seconds % 3600 / 60, seconds % 60);
                if hours != 0 {
                    write!(f, "{hours}H")?;
                }
                if minutes != 0 {
                    write!(f, "{minutes}M")?;
                }
                if seconds != 0 {
                    write!(f, "{seconds}S")?;
                }
                Ok(())
            }
        }
    }
}

static RE_PERMISSIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-]?)P?(?:T|(\d+)W|(\d+)D|(\d+)H|(\d+)M|(\d+)S)*$")
        .expect("valid permissive duration regex")
});
static RE_STRICT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-]?)P(?:(\d+)W|(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?)$")
        .expect("valid strict duration regex")
});

/// Parse a duration, accepting a tolerant superset of RFC 5545 §3.3.6.
///
/// Weeks are counted as seven days. A total made of whole days only is returned as
/// [`TemporalAmount::Period`], anything with hours, minutes or seconds as
/// [`TemporalAmount::Duration`].
pub fn parse_duration(text: &str) -> Result<TemporalAmount, DurationError> {
    let text = text.trim();
    if text.is_empty() {
        return parse_strict(text);
    }

    let Some(captures) = RE_PERMISSIVE.captures(text) else {
        return parse_strict(text);
    };

    from_captures(text, &captures)
}

/// Strict RFC 5545 `dur-value`.
fn parse_strict(text: &str) -> Result<TemporalAmount, DurationError> {
    let invalid = || DurationError::Invalid(text.to_owned());
    let captures = RE_STRICT.captures(text).ok_or_else(invalid)?;

    // `P` and `PT` alone match the pattern but carry no component.
    if (2..=6).all(|group| captures.get(group).is_none()) {
        return Err(invalid());
    }

    from_captures(text, &captures)
}

/// Both patterns share the group layout: sign, weeks, days, hours, minutes, seconds.
fn from_captures(text: &str, captures: &Captures<'_>) -> Result<TemporalAmount, DurationError> {
    let out_of_range = || DurationError::OutOfRange(text.to_owned());
    let number = |group: usize| -> Result<i64, DurationError> {
        captures.get(group).map_or(Ok(0), |m| m.as_str().parse().map_err(|_| out_of_range()))
    };

    let sign = if captures.get(1).map(|m| m.as_str()) == Some("-") { -1 } else { 1 };
    let days = number(2)?
        .checked_mul(DAYS_PER_WEEK)
        .and_then(|weeks| weeks.checked_add(number(3).ok()?))
        .ok_or_else(out_of_range)?;

    to_amount(text, sign, days, number(4)?, number(5)?, number(6)?)
}

fn to_amount(
    text: &str,
    sign: i64,
    days: i64,
    hours: i64,
    minutes: i64,
    seconds: i64,
) -> Result<TemporalAmount, DurationError> {
    if days != 0 && hours == 0 && minutes == 0 && seconds == 0 {
        return Ok(TemporalAmount::Period { days: sign * days });
    }

    let total = days
        .checked_mul(SECONDS_PER_DAY)
        .and_then(|d| d.checked_add(hours.checked_mul(SECONDS_PER_HOUR)?))
        .and_then(|t| t.checked_add(minutes.checked_mul(SECONDS_PER_MINUTE)?))
        .and_then(|t| t.checked_add(seconds))
        .ok_or_else(|| DurationError::OutOfRange(text.to_owned()))?;
    chrono::Duration::try_seconds(sign * total)
        .map(TemporalAmount::Duration)
        .ok_or_else(|| DurationError::OutOfRange(text.to_owned()))
}
