use chrono::{DateTime, Utc};
use std::{fmt, str::FromStr};

use crate::{
    duration::TemporalAmount,
    property::{RawComponent, RawProperty},
    recurrence_set::RecurrenceDateList,
    rule::RecurrenceRule,
    value::DateValue,
    DateTimeExt,
};

/// Status of the event.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Status {
    /// Event is not confirmed to be happening yet.
    Tentative,
    /// Event is confirmed to be happening.
    #[default]
    Confirmed,
    /// Event has been cancelled.
    Cancelled,
}

impl FromStr for Status {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TENTATIVE" => Ok(Status::Tentative),
            "CONFIRMED" => Ok(Status::Confirmed),
            "CANCELLED" => Ok(Status::Cancelled),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Tentative => write!(f, "TENTATIVE"),
            Status::Confirmed => write!(f, "CONFIRMED"),
            Status::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Is a subscriber free or busy during the event?
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Transparency {
    // Subscriber is considered busy during the event.
    #[default]
    Opaque,
    // Subscriber is not considered busy during the event.
    Transparent,
}

impl FromStr for Transparency {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OPAQUE" => Ok(Transparency::Opaque),
            "TRANSPARENT" => Ok(Transparency::Transparent),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Transparency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transparency::Opaque => write!(f, "OPAQUE"),
            Transparency::Transparent => write!(f, "TRANSPARENT"),
        }
    }
}

/// A `VEVENT`, together with the exceptions (`RECURRENCE-ID` instances) that belong to it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CalendarEvent {
    /// Globally unique identifier for this event.
    pub uid: String,
    /// Revision of this event.
    pub sequence: u32,
    /// Set on exceptions only: the occurrence this exception replaces.
    pub recurrence_id: Option<DateValue>,
    /// Required; events without one are rejected by the repair engine.
    pub start: Option<DateValue>,
    pub end: Option<DateValue>,
    pub duration: Option<TemporalAmount>,
    /// `DTSTAMP`. Not taken over on import, set again on export.
    pub stamp: Option<DateTime<Utc>>,
    pub rrules: Vec<RecurrenceRule>,
    pub exrules: Vec<RecurrenceRule>,
    pub rdates: Vec<RecurrenceDateList>,
    pub exdates: Vec<RecurrenceDateList>,
    /// Modified instances of this event.
    pub exceptions: Vec<CalendarEvent>,

    /// Title or short description of this event.
    pub summary: Option<String>,
    pub location: Option<String>,
    /// Long description of this event.
    pub description: Option<String>,
    pub url: Option<String>,
    pub status: Option<Status>,
    /// `CLASS`.
    pub classification: Option<String>,
    pub transparency: Option<Transparency>,
    pub organizer: Option<RawProperty>,
    pub attendees: Vec<RawProperty>,
    pub categories: Vec<String>,
    pub last_modified: Option<DateValue>,
    /// `VALARM` components, kept as written.
    pub alarms: Vec<RawComponent>,
    /// Properties without a field of their own, kept as written.
    pub unknown_properties: Vec<RawProperty>,
}

impl CalendarEvent {
    /// Is this an all-day event?
    pub fn is_all_day(&self) -> bool {
        self.start.as_ref().is_some_and(DateValue::is_date)
    }

    /// Timezones referenced by any date value of this event and its exceptions.
    pub fn timezone_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = std::iter::once(self)
            .chain(&self.exceptions)
            .flat_map(|event| {
                let single = [&event.start, &event.end, &event.recurrence_id].into_iter().flatten();
                let lists = event.rdates.iter().chain(&event.exdates).flat_map(|list| &list.dates);
                single.chain(lists)
            })
            .filter_map(DateValue::tzid)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

impl fmt::Display for CalendarEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        folded_writeln!(f, "BEGIN:VEVENT")?;
        folded_writeln!(f, "UID:{}", self.uid)?;
        if let Some(stamp) = &self.stamp {
            folded_writeln!(f, "DTSTAMP:{}", stamp.to_ical_format())?;
        }
        if self.sequence != 0 {
            folded_writeln!(f, "SEQUENCE:{}", self.sequence)?;
        }
        if let Some(recurrence_id) = &self.recurrence_id {
            folded_writeln!(f, "RECURRENCE-ID{}:{recurrence_id}", recurrence_id.params())?;
        }
        if let Some(start) = &self.start {
            folded_writeln!(f, "DTSTART{}:{start}", start.params())?;
        }
        if let Some(end) = &self.end {
            folded_writeln!(f, "DTEND{}:{end}", end.params())?;
        }
        if let Some(duration) = &self.duration {
            folded_writeln!(f, "DURATION:{duration}")?;
        }
        for rule in &self.rrules {
            folded_writeln!(f, "RRULE:{rule}")?;
        }
        for rule in &self.exrules {
            folded_writeln!(f, "EXRULE:{rule}")?;
        }
        for rdate in &self.rdates {
            rdate.write(f, "RDATE")?;
        }
        for exdate in &self.exdates {
            exdate.write(f, "EXDATE")?;
        }
        if let Some(summary) = &self.summary {
            folded_writeln!(f, "SUMMARY:{summary}")?;
        }
        if let Some(location) = &self.location {
            folded_writeln!(f, "LOCATION:{location}")?;
        }
        if let Some(description) = &self.description {
            folded_writeln!(f, "DESCRIPTION:{description}")?;
        }
        if let Some(url) = &self.url {
            folded_writeln!(f, "URL:{url}")?;
        }
        if let Some(status) = &self.status {
            folded_writeln!(f, "STATUS:{status}")?;
        }
        if let Some(classification) = &self.classification {
            folded_writeln!(f, "CLASS:{classification}")?;
        }
        if let Some(transparency) = &self.transparency {
            folded_writeln!(f, "TRANSP:{transparency}")?;
        }
        if let Some(organizer) = &self.organizer {
            write!(f, "{organizer}")?;
        }
        for attendee in &self.attendees {
            write!(f, "{attendee}")?;
        }
        if !self.categories.is_empty() {
            folded_writeln!(f, "CATEGORIES:{}", self.categories.join(","))?;
        }
        if let Some(last_modified) = &self.last_modified {
            folded_writeln!(f, "LAST-MODIFIED{}:{last_modified}", last_modified.params())?;
        }
        for property in &self.unknown_properties {
            write!(f, "{property}")?;
        }
        for alarm in &self.alarms {
            write!(f, "{alarm}")?;
        }
        folded_writeln!(f, "END:VEVENT")?;

        for exception in &self.exceptions {
            write!(f, "{exception}")?;
        }
        Ok(())
    }
}
