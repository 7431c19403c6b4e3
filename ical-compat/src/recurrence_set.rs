//! Flat storage form of `RDATE`/`EXDATE` lists: `[tzid;]token(,token)*`.
//!
//! Date-time tokens are `yyyymmddThhmmss` in the zone of the prefix, or `yyyymmddThhmmssZ` when
//! there is no prefix. All-day tokens are always `yyyymmddT000000Z`.

use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;
use tracing::warn;

use crate::{
    catalog::TimezoneCatalog,
    value::{DateValue, TimeKind},
    DateTimeExt,
};

#[derive(Debug, Error, Eq, PartialEq)]
pub enum RecurrenceSetError {
    #[error("`{0}` is not a valid recurrence set token")]
    InvalidToken(String),
}

/// Values of one `RDATE` or `EXDATE` property.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RecurrenceDateList {
    pub dates: Vec<DateValue>,
    /// `VALUE=PERIOD` values, kept as written.
    pub periods: Vec<String>,
}

impl RecurrenceDateList {
    pub fn new(dates: Vec<DateValue>) -> Self {
        RecurrenceDateList { dates, periods: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() && self.periods.is_empty()
    }

    /// Content lines for this list as property `name`. Consecutive values that need the same
    /// parameters share a line.
    pub(crate) fn write(&self, f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
        let mut start = 0;
        while start < self.dates.len() {
            let params = self.dates[start].params();
            let end = self.dates[start..]
                .iter()
                .position(|date| date.params() != params)
                .map_or(self.dates.len(), |offset| start + offset);
            let values: Vec<_> = self.dates[start..end].iter().map(ToString::to_string).collect();
            folded_writeln!(f, "{name}{params}:{}", values.join(","))?;
            start = end;
        }
        if !self.periods.is_empty() {
            folded_writeln!(f, "{name};VALUE=PERIOD:{}", self.periods.join(","))?;
        }
        Ok(())
    }
}

/// Encode `lists` into one storage string.
///
/// The zone of the very first value becomes the zone of the whole string; values of other zones
/// are re-expressed in it. With `all_day`, every value collapses to its calendar day.
pub fn encode(lists: &[RecurrenceDateList], all_day: bool, catalog: &TimezoneCatalog) -> String {
    let tzid = lists
        .first()
        .and_then(|list| list.dates.first())
        .and_then(DateValue::tzid)
        .filter(|tzid| !catalog.is_utc(tzid))
        .map(|tzid| catalog.platform_id(tzid));

    let mut tokens = Vec::new();
    for list in lists {
        for period in &list.periods {
            warn!(period = %period, "dropping PERIOD value, not supported in recurrence sets");
        }

        for value in &list.dates {
            let token = match value {
                DateValue::Date(date) => format!("{}T000000Z", date.to_ical_format()),
                DateValue::DateTime(date_time, _) if all_day => {
                    format!("{}T000000Z", date_time.date().to_ical_format())
                }
                DateValue::DateTime(..) => {
                    let instant = catalog.to_utc(value);
                    match tzid {
                        Some(tzid) => catalog.to_zone(instant, tzid).to_ical_format(),
                        None => instant.to_ical_format(),
                    }
                }
            };
            tokens.push(token);
        }
    }

    match (tzid, tokens.is_empty()) {
        (_, true) => String::new(),
        (Some(tzid), false) if !all_day => format!("{tzid};{}", tokens.join(",")),
        _ => tokens.join(","),
    }
}

/// Decode a storage string. Values at `exclude` are dropped.
pub fn decode(
    text: &str,
    all_day: bool,
    exclude: Option<DateTime<Utc>>,
    catalog: &TimezoneCatalog,
) -> Result<RecurrenceDateList, RecurrenceSetError> {
    let (tzid, values) = match text.split_once(';') {
        Some((tzid, values)) if !catalog.is_utc(tzid) => (Some(catalog.platform_id(tzid)), values),
        Some((_, values)) => (None, values),
        None => (None, text),
    };

    let mut list = RecurrenceDateList::default();
    for token in values.split(',').map(str::trim).filter(|token| !token.is_empty()) {
        let parsed = DateValue::parse(token, None)
            .map_err(|_| RecurrenceSetError::InvalidToken(token.to_owned()))?;

        let value = if all_day {
            DateValue::Date(parsed.date())
        } else {
            let (date_time, kind) = match parsed {
                DateValue::Date(date) => (date.and_hms_opt(0, 0, 0).unwrap_or_default(), None),
                DateValue::DateTime(date_time, kind) => (date_time, Some(kind)),
            };
            match (tzid, kind) {
                (Some(tzid), Some(TimeKind::Utc)) => {
                    DateValue::zoned(catalog.to_zone(date_time.and_utc(), tzid), tzid)
                }
                (Some(tzid), _) => DateValue::zoned(date_time, tzid),
                (None, _) => DateValue::utc(date_time),
            }
        };

        if exclude.is_some_and(|exclude| catalog.to_utc(&value) == exclude) {
            continue;
        }
        list.dates.push(value);
    }

    Ok(list)
}
