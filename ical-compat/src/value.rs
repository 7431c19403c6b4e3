//! Date, date-time and UTC offset values as they appear in iCalendar content lines.

use chrono::{NaiveDate, NaiveDateTime};
use std::{fmt, str::FromStr};
use thiserror::Error;

use crate::DateTimeExt;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ValueError {
    #[error("`{0}` is not a valid DATE or DATE-TIME value")]
    InvalidDate(String),
    #[error("`{0}` is not a valid UTC offset (expected `{{-/+}}HHMM[SS]`)")]
    InvalidOffset(String),
    #[error("`{0}` is not a valid recurrence rule")]
    InvalidRule(String),
}

/// How the wall-clock time of a [`DateValue::DateTime`] maps onto an instant.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum TimeKind {
    /// Written with a trailing `Z`.
    Utc,
    /// Local time in the timezone with this identifier.
    Zoned(String),
    /// No timezone at all, interpreted in the default timezone of the consumer.
    Floating,
}

/// Value of a DATE or DATE-TIME property (`DTSTART`, `UNTIL`, `RDATE`, ...).
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum DateValue {
    Date(NaiveDate),
    DateTime(NaiveDateTime, TimeKind),
}

impl DateValue {
    pub fn utc(date_time: NaiveDateTime) -> Self {
        DateValue::DateTime(date_time, TimeKind::Utc)
    }

    pub fn zoned(date_time: NaiveDateTime, tzid: impl Into<String>) -> Self {
        DateValue::DateTime(date_time, TimeKind::Zoned(tzid.into()))
    }

    pub fn floating(date_time: NaiveDateTime) -> Self {
        DateValue::DateTime(date_time, TimeKind::Floating)
    }

    /// Parse a single value. `tzid` is the `TZID` parameter of the owning property; a trailing
    /// `Z` takes precedence over it.
    pub fn parse(text: &str, tzid: Option<&str>) -> Result<Self, ValueError> {
        let text = text.trim();
        let invalid = || ValueError::InvalidDate(text.to_owned());

        if !text.contains(['T', 't']) {
            return NaiveDate::parse_from_str(text, "%Y%m%d")
                .map(DateValue::Date)
                .map_err(|_| invalid());
        }

        let (body, utc) = match text.strip_suffix(['Z', 'z']) {
            Some(body) => (body, true),
            None => (text, false),
        };
        let date_time = NaiveDateTime::parse_from_str(&body.to_ascii_uppercase(), "%Y%m%dT%H%M%S")
            .map_err(|_| invalid())?;

        Ok(match (utc, tzid) {
            (true, _) => DateValue::utc(date_time),
            (false, Some(tzid)) => DateValue::zoned(date_time, tzid),
            (false, None) => DateValue::floating(date_time),
        })
    }

    /// Parse a comma separated list of values sharing one `TZID` parameter.
    pub fn parse_list(text: &str, tzid: Option<&str>) -> Result<Vec<Self>, ValueError> {
        text.split(',')
            .filter(|token| !token.trim().is_empty())
            .map(|token| DateValue::parse(token, tzid))
            .collect()
    }

    pub fn is_date(&self) -> bool {
        matches!(self, DateValue::Date(_))
    }

    pub fn tzid(&self) -> Option<&str> {
        match self {
            DateValue::DateTime(_, TimeKind::Zoned(tzid)) => Some(tzid),
            _ => None,
        }
    }

    /// Calendar day as written, without any timezone conversion.
    pub fn date(&self) -> NaiveDate {
        match self {
            DateValue::Date(date) => *date,
            DateValue::DateTime(date_time, _) => date_time.date(),
        }
    }

    /// Property parameters needed to serialize this value, e.g. `;VALUE=DATE`.
    pub fn params(&self) -> String {
        match self {
            DateValue::Date(_) => ";VALUE=DATE".to_owned(),
            DateValue::DateTime(_, TimeKind::Zoned(tzid)) => format!(";TZID={tzid}"),
            DateValue::DateTime(..) => String::new(),
        }
    }
}

impl fmt::Display for DateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateValue::Date(date) => f.write_str(&date.to_ical_format()),
            DateValue::DateTime(date_time, TimeKind::Utc) => {
                write!(f, "{}Z", date_time.to_ical_format())
            }
            DateValue::DateTime(date_time, _) => f.write_str(&date_time.to_ical_format()),
        }
    }
}

/// UTC offset of an observance (`TZOFFSETFROM`/`TZOFFSETTO`).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct UtcOffset {
    seconds: i32,
}

impl UtcOffset {
    pub fn from_seconds(seconds: i32) -> Self {
        UtcOffset { seconds }
    }

    pub fn seconds(self) -> i32 {
        self.seconds
    }

    pub fn to_duration(self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.seconds))
    }
}

impl FromStr for UtcOffset {
    type Err = ValueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let err = || ValueError::InvalidOffset(value.to_owned());

        let (neg, remaining) = if let Some(remaining) = value.strip_prefix('-') {
            (true, remaining)
        } else if let Some(remaining) = value.strip_prefix('+') {
            (false, remaining)
        } else {
            return Err(err());
        };

        if !(remaining.len() == 4 || remaining.len() == 6)
            || !remaining.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(err());
        }

        let field = |range: std::ops::Range<usize>| -> Result<i32, ValueError> {
            remaining.get(range).and_then(|s| s.parse().ok()).ok_or_else(err)
        };
        let hour = field(0..2)?;
        let minute = field(2..4)?;
        let second = if remaining.len() == 6 { field(4..6)? } else { 0 };
        if hour > 23 || minute > 59 || second > 59 {
            return Err(err());
        }

        let seconds = hour * 3600 + minute * 60 + second;
        Ok(UtcOffset { seconds: if neg { -seconds } else { seconds } })
    }
}

impl fmt::Display for UtcOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.seconds < 0 {
            write!(f, "-")?;
        } else {
            write!(f, "+")?;
        }
        let total = self.seconds.unsigned_abs();
        write!(f, "{:02}{:02}", total / 3600, total % 3600 / 60)?;
        if total % 60 != 0 {
            write!(f, "{:02}", total % 60)?;
        }
        Ok(())
    }
}
