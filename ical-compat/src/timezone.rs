//! `VTIMEZONE` definitions and the onset arithmetic of their observances.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use rrule::RRuleSet;
use std::fmt;
use thiserror::Error;
use tracing::warn;

use crate::{
    property::{RawComponent, RawProperty},
    rule::RecurrenceRule,
    value::{DateValue, TimeKind, UtcOffset, ValueError},
    DateTimeExt,
};

#[derive(Debug, Error, Eq, PartialEq)]
pub enum TimezoneError {
    #[error("Timezone definition has no `TZID`")]
    MissingId,
    #[error("Timezone {0} has no STANDARD or DAYLIGHT observance")]
    NoObservances(String),
    #[error("Observance of timezone {0} is missing `{1}`")]
    MissingProperty(String, &'static str),
    #[error("Observance of timezone {0} has recurrence rule which sets mutually exclusive `UNTIL` and `COUNT`")]
    CountUntilMutuallyExclusive(String),
    #[error("Timezone {0} has an invalid value: {1}")]
    InvalidValue(String, ValueError),
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ObservanceKind {
    Standard,
    Daylight,
}

impl ObservanceKind {
    pub fn component_name(self) -> &'static str {
        match self {
            ObservanceKind::Standard => "STANDARD",
            ObservanceKind::Daylight => "DAYLIGHT",
        }
    }
}

/// One `STANDARD` or `DAYLIGHT` sub-component.
#[derive(Clone, Debug, PartialEq)]
pub struct Observance {
    pub kind: ObservanceKind,
    /// Local time of the first onset, expressed in `offset_from`.
    pub start: NaiveDateTime,
    /// UTC offset in use right before each onset.
    pub offset_from: UtcOffset,
    /// UTC offset in use from each onset on.
    pub offset_to: UtcOffset,
    /// `TZNAME`s.
    pub names: Vec<String>,
    /// Yearly (or other) repetition of the onset.
    pub rule: Option<RecurrenceRule>,
    /// Additional onsets, local time expressed in `offset_from`.
    pub rdates: Vec<NaiveDateTime>,
    /// Anything else (`COMMENT`, extension properties).
    pub properties: Vec<RawProperty>,
}

fn rrule_tz(local: NaiveDateTime) -> DateTime<rrule::Tz> {
    let tz: rrule::Tz = Utc.into();
    local.and_utc().with_timezone(&tz)
}

impl Observance {
    fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        (local - self.offset_from.to_duration()).and_utc()
    }

    fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.naive_utc() + self.offset_from.to_duration()
    }

    pub fn first_onset(&self) -> DateTime<Utc> {
        self.to_utc(self.start)
    }

    /// Onsets given by `RDATE`, as instants.
    pub fn rdate_onsets(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.rdates.iter().map(|rdate| self.to_utc(*rdate))
    }

    /// Expansion of `rule` in the observance's local frame.
    ///
    /// `DTSTART` is local time while `UNTIL` is UTC, so the rule is handed to the expander with
    /// both shifted into the same frame and pretending to be UTC.
    fn rule_set(&self) -> Option<RRuleSet> {
        let mut rule = self.rule.clone()?;
        rule.until = rule.until.map(|until| match until {
            DateValue::DateTime(until, TimeKind::Utc) => {
                DateValue::utc(until + self.offset_from.to_duration())
            }
            DateValue::DateTime(until, _) => DateValue::utc(until),
            DateValue::Date(until) => {
                DateValue::utc(until.and_hms_opt(23, 59, 59).unwrap_or_default())
            }
        });

        let text = format!("DTSTART:{}Z\nRRULE:{rule}", self.start.to_ical_format());
        match text.parse::<RRuleSet>() {
            Ok(set) => Some(set),
            Err(e) => {
                warn!(rule = %rule, error = %e, "ignoring unusable observance recurrence rule");
                None
            }
        }
    }

    /// Latest onset at or before `instant`, or `None` when the observance only starts later.
    pub fn latest_onset(&self, instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let first = self.first_onset();
        if first > instant {
            return None;
        }

        let limit = self.to_local(instant);
        let from_rule = self.rule_set().and_then(|set| {
            set.before(rrule_tz(limit + Duration::seconds(1)))
                .all(u16::MAX)
                .dates
                .into_iter()
                .map(|date| date.naive_utc())
                .filter(|date| *date <= limit)
                .max()
        });
        let from_rdates = self.rdates.iter().copied().filter(|rdate| *rdate <= limit).max();

        let latest = [Some(self.start), from_rule, from_rdates].into_iter().flatten().max()?;
        Some(self.to_utc(latest))
    }

    /// Forget the onsets before `onset`, one of this observance's own onsets.
    ///
    /// Without a rule, `DTSTART` moves forward to `onset`. With a rule, `DTSTART` anchors the
    /// rule and stays; only earlier `RDATE`s go.
    pub fn drop_onsets_before(&mut self, onset: DateTime<Utc>) {
        let local = self.to_local(onset);
        self.rdates.retain(|rdate| *rdate >= local);
        if self.rule.is_none() && local > self.start {
            self.start = local;
            self.rdates.retain(|rdate| *rdate > local);
        }
    }

    /// First onset produced by `rule` strictly after `instant`.
    pub fn next_rule_onset_after(&self, instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let after = self.to_local(instant);
        let next = self
            .rule_set()?
            .after(rrule_tz(after))
            .all(2)
            .dates
            .into_iter()
            .map(|date| date.naive_utc())
            .find(|date| *date > after)?;
        Some(self.to_utc(next))
    }

    fn from_component(tzid: &str, component: &RawComponent) -> Result<Self, TimezoneError> {
        let kind = if component.name.eq_ignore_ascii_case("DAYLIGHT") {
            ObservanceKind::Daylight
        } else {
            ObservanceKind::Standard
        };
        let invalid = |e| TimezoneError::InvalidValue(tzid.to_owned(), e);
        let required = |name: &'static str| {
            component
                .property(name)
                .ok_or_else(|| TimezoneError::MissingProperty(tzid.to_owned(), name))
        };

        let offset_from: UtcOffset = required("TZOFFSETFROM")?.value.trim().parse().map_err(invalid)?;
        let offset_to: UtcOffset = required("TZOFFSETTO")?.value.trim().parse().map_err(invalid)?;
        let start = match DateValue::parse(&required("DTSTART")?.value, None).map_err(invalid)? {
            DateValue::Date(date) => date.and_hms_opt(0, 0, 0).unwrap_or_default(),
            DateValue::DateTime(start, _) => start,
        };

        let mut observance = Observance {
            kind,
            start,
            offset_from,
            offset_to,
            names: Vec::new(),
            rule: None,
            rdates: Vec::new(),
            properties: Vec::new(),
        };

        for property in &component.properties {
            match property.name.as_str() {
                "DTSTART" | "TZOFFSETFROM" | "TZOFFSETTO" => {}
                "TZNAME" => observance.names.push(property.value.clone()),
                "RRULE" => observance.rule = Some(property.value.parse().map_err(invalid)?),
                "RDATE" => {
                    for rdate in DateValue::parse_list(&property.value, None).map_err(invalid)? {
                        observance.rdates.push(match rdate {
                            DateValue::Date(date) => date.and_hms_opt(0, 0, 0).unwrap_or_default(),
                            DateValue::DateTime(rdate, TimeKind::Utc) => {
                                rdate + offset_from.to_duration()
                            }
                            DateValue::DateTime(rdate, _) => rdate,
                        });
                    }
                }
                _ => observance.properties.push(property.clone()),
            }
        }

        Ok(observance)
    }
}

impl fmt::Display for Observance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.kind.component_name();
        folded_writeln!(f, "BEGIN:{name}")?;
        folded_writeln!(f, "DTSTART:{}", self.start.to_ical_format())?;
        folded_writeln!(f, "TZOFFSETFROM:{}", self.offset_from)?;
        folded_writeln!(f, "TZOFFSETTO:{}", self.offset_to)?;
        if let Some(rule) = &self.rule {
            folded_writeln!(f, "RRULE:{rule}")?;
        }
        if !self.rdates.is_empty() {
            let rdates: Vec<_> = self.rdates.iter().map(|d| d.to_ical_format()).collect();
            folded_writeln!(f, "RDATE:{}", rdates.join(","))?;
        }
        for tz_name in &self.names {
            folded_writeln!(f, "TZNAME:{tz_name}")?;
        }
        for property in &self.properties {
            write!(f, "{property}")?;
        }
        folded_writeln!(f, "END:{name}")
    }
}

/// Complete `VTIMEZONE`.
#[derive(Clone, Debug, PartialEq)]
pub struct TimezoneDefinition {
    /// `TZID`.
    pub id: String,
    /// `TZURL`.
    pub url: Option<String>,
    /// Other properties (`LAST-MODIFIED`, `X-LIC-LOCATION`, ...).
    pub properties: Vec<RawProperty>,
    pub observances: Vec<Observance>,
}

impl TimezoneDefinition {
    pub fn from_component(component: &RawComponent) -> Result<Self, TimezoneError> {
        let id = component
            .property("TZID")
            .map(|p| p.value.trim().to_owned())
            .filter(|id| !id.is_empty())
            .ok_or(TimezoneError::MissingId)?;

        let observances = component
            .components
            .iter()
            .filter(|c| c.name == "STANDARD" || c.name == "DAYLIGHT")
            .map(|c| Observance::from_component(&id, c))
            .collect::<Result<Vec<_>, _>>()?;

        let definition = TimezoneDefinition {
            url: component.property("TZURL").map(|p| p.value.clone()),
            properties: component
                .properties
                .iter()
                .filter(|p| p.name != "TZID" && p.name != "TZURL")
                .cloned()
                .collect(),
            id,
            observances,
        };
        definition.validate()?;
        Ok(definition)
    }

    /// Structural rules every definition has to satisfy.
    pub fn validate(&self) -> Result<(), TimezoneError> {
        if self.id.is_empty() {
            return Err(TimezoneError::MissingId);
        }
        if self.observances.is_empty() {
            return Err(TimezoneError::NoObservances(self.id.clone()));
        }
        for observance in &self.observances {
            if let Some(rule) = &observance.rule {
                if rule.until.is_some() && rule.count.is_some() {
                    return Err(TimezoneError::CountUntilMutuallyExclusive(self.id.clone()));
                }
            }
        }
        Ok(())
    }

    /// UTC offset in effect at `instant`.
    ///
    /// Before the earliest onset the `TZOFFSETFROM` of the earliest observance applies.
    pub fn offset_at(&self, instant: DateTime<Utc>) -> Option<UtcOffset> {
        let current = self
            .observances
            .iter()
            .filter_map(|o| o.latest_onset(instant).map(|onset| (onset, o)))
            .max_by_key(|(onset, _)| *onset);
        if let Some((_, observance)) = current {
            return Some(observance.offset_to);
        }

        self.observances.iter().min_by_key(|o| o.first_onset()).map(|o| o.offset_from)
    }
}

impl fmt::Display for TimezoneDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        folded_writeln!(f, "BEGIN:VTIMEZONE")?;
        folded_writeln!(f, "TZID:{}", self.id)?;
        if let Some(url) = &self.url {
            folded_writeln!(f, "TZURL:{url}")?;
        }
        for property in &self.properties {
            write!(f, "{property}")?;
        }
        for observance in &self.observances {
            write!(f, "{observance}")?;
        }
        folded_writeln!(f, "END:VTIMEZONE")
    }
}
