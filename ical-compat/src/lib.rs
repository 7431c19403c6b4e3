use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

// Current name of ical-compat.
const NAME: &str = env!("CARGO_PKG_NAME");
// Current version of ical-compat.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// RFC 5545 §3.1 specifies that folding must occur at 75 octets.
const FOLD_THRESHOLD_OCTETS: usize = 75;
/// Line break plus the single whitespace that starts a continuation line.
const FOLD_CONTINUATION: &str = "\r\n ";

/// Largest index not above `index` that starts a character of `s`.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    (0..=index.min(s.len())).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

/// Fold content lines according to RFC 5545 §3.1.
fn fold(s: String) -> String {
    let s = s.replace('\n', "\\n");

    if s.len() <= FOLD_THRESHOLD_OCTETS {
        return s;
    }

    let mut folded = String::with_capacity(s.len() + s.len() / FOLD_THRESHOLD_OCTETS * 3);
    let mut rest = s.as_str();
    let mut limit = FOLD_THRESHOLD_OCTETS;
    while rest.len() > limit {
        let (line, tail) = rest.split_at(floor_char_boundary(rest, limit));
        folded.push_str(line);
        folded.push_str(FOLD_CONTINUATION);
        rest = tail;
        // The leading space counts towards the limit of continuation lines.
        limit = FOLD_THRESHOLD_OCTETS - 1;
    }
    folded.push_str(rest);
    folded
}

macro_rules! folded_writeln {
    ($dst:expr $(,)?) => {
        std::write!($dst, "\r\n")
    };
    ($dst:expr, $($arg:tt)*) => {
        std::write!($dst, "{}\r\n", &$crate::fold(std::format!($($arg)*)))
    };
}

pub mod catalog;
pub mod config;
pub mod duration;
pub mod event;
pub mod minify;
pub mod parse;
pub mod preprocess;
pub mod property;
pub mod recurrence_set;
pub mod repair;
pub mod rule;
pub mod timezone;
pub mod value;
pub mod write;


pub use catalog::{TimezoneCatalog, TimezoneCatalogBuilder};
pub use config::Settings;
pub use duration::{parse_duration, DurationError, TemporalAmount};
pub use event::CalendarEvent;
pub use minify::minify;
pub use parse::{import, import_reader, Import, ParseError, RejectedEvent};
pub use preprocess::{Preprocessor, StreamPreprocessor};
pub use repair::{EventRepairer, RepairError};
pub use timezone::TimezoneDefinition;
pub use value::{DateValue, TimeKind};
pub use write::{export, ExportError};

/// `chrono::DateTime` fixed to UTC.
type UtcDateTime = chrono::DateTime<chrono::Utc>;

pub(crate) trait DateTimeExt {
    /// Generates the iCalendar text of a date or date-time value, without parameters.
    /// e.g. `19970714T173000Z`, `19970714T133000` or `19970714`
    ///
    /// ref: <https://tools.ietf.org/html/rfc5545#section-3.3.5>
    fn to_ical_format(&self) -> String;
}

impl DateTimeExt for UtcDateTime {
    fn to_ical_format(&self) -> String {
        self.format("%Y%m%dT%H%M%SZ").to_string()
    }
}

impl DateTimeExt for NaiveDateTime {
    fn to_ical_format(&self) -> String {
        self.format("%Y%m%dT%H%M%S").to_string()
    }
}

impl DateTimeExt for NaiveDate {
    fn to_ical_format(&self) -> String {
        self.format("%Y%m%d").to_string()
    }
}

/// A complete `VCALENDAR`, ready to be written.
#[derive(Clone, Debug, Default)]
pub struct Calendar {
    /// `PRODID`; one naming this library when absent.
    pub product_id: Option<String>,
    /// Calendar properties besides `VERSION`, `PRODID` and `CALSCALE`.
    pub properties: Vec<property::RawProperty>,
    pub timezones: Vec<TimezoneDefinition>,
    pub events: Vec<CalendarEvent>,
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        folded_writeln!(f, "BEGIN:VCALENDAR")?;
        folded_writeln!(f, "VERSION:2.0")?;
        match &self.product_id {
            Some(product_id) => folded_writeln!(f, "PRODID:{product_id}")?,
            None => folded_writeln!(f, "PRODID:-//{NAME}//{VERSION}//EN")?,
        }
        folded_writeln!(f, "CALSCALE:GREGORIAN")?;
        for property in &self.properties {
            write!(f, "{property}")?;
        }
        for timezone in &self.timezones {
            write!(f, "{timezone}")?;
        }
        for event in &self.events {
            write!(f, "{event}")?;
        }
        folded_writeln!(f, "END:VCALENDAR")
    }
}
