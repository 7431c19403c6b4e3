//! Registry of timezone definitions keyed by the host zone database.
//!
//! Identifiers found in iCalendar data don't always match the host's identifiers
//! (`Europe/Vienna (Austria)`, lower case variants, legacy names, ...). The catalog maps every
//! identifier onto a known one and hands out one shared [`TimezoneDefinition`] per zone: either
//! one registered explicitly, or one derived from the host zone database on first use.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc,
};
use chrono_tz::{OffsetComponents, Tz, TZ_VARIANTS};
use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};
use tracing::{debug, warn};

use crate::{
    timezone::{Observance, ObservanceKind, TimezoneDefinition},
    value::{DateValue, TimeKind, UtcOffset},
};

/// Identifiers that all name UTC.
const UTC_IDS: &[&str] =
    &["UTC", "Etc/UTC", "Etc/UCT", "UCT", "Universal", "Etc/Universal", "Zulu", "Etc/Zulu"];

/// Derived definitions cover transitions from this year on.
const FIRST_DERIVED_YEAR: i32 = 1970;
/// Derived definitions cover transitions before this year.
const END_DERIVED_YEAR: i32 = 2038;

#[derive(Default)]
pub struct TimezoneCatalogBuilder {
    default_zone: Option<String>,
    definitions: Vec<TimezoneDefinition>,
}

impl TimezoneCatalogBuilder {
    /// Zone used for floating times and unresolvable identifiers. Without one, the host's
    /// configured zone is used, and UTC if that can't be determined.
    pub fn default_zone(mut self, id: impl Into<String>) -> Self {
        self.default_zone = Some(id.into());
        self
    }

    /// Register a definition to be returned instead of a derived one.
    pub fn definition(mut self, definition: TimezoneDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn build(self) -> TimezoneCatalog {
        let mut known_ids: Vec<&'static str> = TZ_VARIANTS.iter().map(|tz| tz.name()).collect();
        known_ids.sort_unstable();
        known_ids.dedup();

        let exact = |id: &str| known_ids.iter().find(|known| known.eq_ignore_ascii_case(id));
        let default_zone = match &self.default_zone {
            Some(id) => match exact(id) {
                Some(known) => known.parse::<Tz>().ok(),
                None => {
                    warn!(tzid = %id, "configured default timezone is unknown, using host timezone");
                    None
                }
            },
            None => None,
        }
        .or_else(|| {
            let host = iana_time_zone::get_timezone().ok()?;
            exact(&host).and_then(|known| known.parse::<Tz>().ok())
        })
        .unwrap_or(Tz::UTC);
        debug!(tzid = default_zone.name(), "default timezone");

        let derived = known_ids.iter().map(|id| (*id, OnceLock::new())).collect();
        let registered = self
            .definitions
            .into_iter()
            .map(|definition| (definition.id.to_ascii_lowercase(), Arc::new(definition)))
            .collect();

        TimezoneCatalog { known_ids, default_zone, registered, derived }
    }
}

/// How an identifier was matched to a host zone.
enum Lookup {
    Exact,
    Substring,
    Default,
}

/// Immutable once built; share it by reference.
pub struct TimezoneCatalog {
    /// Host zone identifiers, sorted lexically.
    known_ids: Vec<&'static str>,
    default_zone: Tz,
    /// Explicitly registered definitions, keyed by lower case `TZID`.
    registered: HashMap<String, Arc<TimezoneDefinition>>,
    /// Definitions derived from the zone database, filled in on first use.
    derived: HashMap<&'static str, OnceLock<Arc<TimezoneDefinition>>>,
}

impl Default for TimezoneCatalog {
    fn default() -> Self {
        TimezoneCatalog::builder().build()
    }
}

impl TimezoneCatalog {
    pub fn builder() -> TimezoneCatalogBuilder {
        TimezoneCatalogBuilder::default()
    }

    /// Identifiers of the host zone database, sorted lexically.
    pub fn known_ids(&self) -> &[&'static str] {
        &self.known_ids
    }

    pub fn default_zone(&self) -> Tz {
        self.default_zone
    }

    /// Map `id` onto a host zone identifier.
    ///
    /// 1. exact match, ignoring case;
    /// 2. first known identifier (in lexical order) that contains `id` or is contained in it;
    /// 3. the default zone.
    pub fn platform_id(&self, id: &str) -> &'static str {
        let (platform_id, how) = self.lookup(id);
        match how {
            Lookup::Exact => {}
            Lookup::Substring => {
                warn!(tzid = %id, platform = platform_id, "timezone matched by substring")
            }
            Lookup::Default => {
                warn!(tzid = %id, default = platform_id, "unknown timezone, using default")
            }
        }
        platform_id
    }

    fn lookup(&self, id: &str) -> (&'static str, Lookup) {
        let id = id.trim();
        if id.is_empty() {
            return (self.default_zone.name(), Lookup::Default);
        }

        if let Some(known) = self.known_ids.iter().find(|known| known.eq_ignore_ascii_case(id)) {
            return (*known, Lookup::Exact);
        }

        match self.known_ids.iter().find(|known| known.contains(id) || id.contains(**known)) {
            Some(known) => (*known, Lookup::Substring),
            None => (self.default_zone.name(), Lookup::Default),
        }
    }

    /// Host zone for `id`, see [`TimezoneCatalog::platform_id`].
    pub fn zone(&self, id: &str) -> Tz {
        self.lookup(id).0.parse().unwrap_or(self.default_zone)
    }

    pub fn is_utc(&self, id: &str) -> bool {
        UTC_IDS.contains(&self.lookup(id).0)
    }

    /// Definition for `id`. Never fails: unknown identifiers resolve to the default zone.
    pub fn resolve(&self, id: &str) -> Arc<TimezoneDefinition> {
        if let Some(definition) = self.registered.get(&id.trim().to_ascii_lowercase()) {
            return definition.clone();
        }

        let platform_id = self.platform_id(id);
        if let Some(definition) = self.registered.get(&platform_id.to_ascii_lowercase()) {
            return definition.clone();
        }

        match self.derived.get(platform_id) {
            Some(cell) => {
                cell.get_or_init(|| Arc::new(derive_definition(self.zone(platform_id)))).clone()
            }
            None => Arc::new(derive_definition(self.default_zone)),
        }
    }

    /// Copy of `definition` named `platform_id` if its offsets agree with the host zone of that
    /// name; otherwise an unchanged copy.
    pub fn canonicalize(
        &self,
        definition: &TimezoneDefinition,
        platform_id: &str,
    ) -> TimezoneDefinition {
        let mut canonical = definition.clone();
        if definition.id == platform_id {
            return canonical;
        }
        let Some(known) = self.known_ids.iter().find(|known| **known == platform_id) else {
            return canonical;
        };
        let Ok(zone) = known.parse::<Tz>() else {
            return canonical;
        };

        if offsets_agree(definition, zone) {
            warn!(tzid = %definition.id, platform = %known, "renaming timezone definition");
            canonical.id = known.to_string();
        }
        canonical
    }

    /// Instant of a date or date-time value. Dates are midnight UTC, floating times are read in
    /// the default zone.
    pub fn to_utc(&self, value: &DateValue) -> DateTime<Utc> {
        match value {
            DateValue::Date(date) => date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc(),
            DateValue::DateTime(date_time, TimeKind::Utc) => date_time.and_utc(),
            DateValue::DateTime(date_time, TimeKind::Zoned(tzid)) => {
                local_to_utc(self.zone(tzid), *date_time)
            }
            DateValue::DateTime(date_time, TimeKind::Floating) => {
                local_to_utc(self.default_zone, *date_time)
            }
        }
    }

    /// Local time of `instant` in the zone `tzid`.
    pub fn to_zone(&self, instant: DateTime<Utc>, tzid: &str) -> NaiveDateTime {
        instant.with_timezone(&self.zone(tzid)).naive_local()
    }
}

/// Earliest mapping on a fold; across a gap the time is shifted forward by the gap's length.
pub(crate) fn local_to_utc(zone: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match zone.from_local_datetime(&local) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => {
            let before = zone.offset_from_utc_datetime(&(local - Duration::days(1))).fix();
            (local - Duration::seconds(i64::from(before.local_minus_utc()))).and_utc()
        }
    }
}

fn utc_offset(zone: Tz, instant: NaiveDateTime) -> (i32, bool) {
    let offset = zone.offset_from_utc_datetime(&instant);
    (offset.fix().local_minus_utc(), !offset.dst_offset().is_zero())
}

fn abbreviation(zone: Tz, instant: NaiveDateTime) -> String {
    zone.from_utc_datetime(&instant).format("%Z").to_string()
}

/// Samples twice a year, from the year the last observance starts in, must give the same
/// offset from `definition` and `zone`.
fn offsets_agree(definition: &TimezoneDefinition, zone: Tz) -> bool {
    let since = definition
        .observances
        .iter()
        .map(|o| o.start.year())
        .max()
        .unwrap_or(FIRST_DERIVED_YEAR)
        .max(FIRST_DERIVED_YEAR);

    (since..END_DERIVED_YEAR)
        .flat_map(|year| [(year, 1), (year, 7)])
        .filter_map(|(year, month)| NaiveDate::from_ymd_opt(year, month, 15)?.and_hms_opt(12, 0, 0))
        .all(|sample| {
            let expected = utc_offset(zone, sample).0;
            definition.offset_at(sample.and_utc()).map(UtcOffset::seconds) == Some(expected)
        })
}

/// One change of offset (or of daylight saving flag) in the zone database.
struct Transition {
    instant: NaiveDateTime,
    from: i32,
    to: i32,
    dst: bool,
    name: String,
}

/// Transitions of `zone` in the covered years, found by probing daily and bisecting each change
/// down to the second.
fn transitions(zone: Tz) -> Vec<Transition> {
    let (Some(first), Some(end)) = (
        NaiveDate::from_ymd_opt(FIRST_DERIVED_YEAR, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)),
        NaiveDate::from_ymd_opt(END_DERIVED_YEAR, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)),
    ) else {
        return Vec::new();
    };

    let mut found = Vec::new();
    let mut probe = first;
    let mut current = utc_offset(zone, probe);
    while probe < end {
        let next = probe + Duration::days(1);
        let next_offset = utc_offset(zone, next);
        if next_offset != current {
            let (mut low, mut high) = (probe, next);
            while high - low > Duration::seconds(1) {
                let middle = low + (high - low) / 2;
                if utc_offset(zone, middle) == current {
                    low = middle;
                } else {
                    high = middle;
                }
            }
            let (to, dst) = utc_offset(zone, high);
            found.push(Transition {
                instant: high,
                from: current.0,
                to,
                dst,
                name: abbreviation(zone, high),
            });
            current = (to, dst);
        }
        probe = next;
    }
    found
}

/// Build a definition from the zone database: one observance for the state at the start of the
/// covered range, plus one observance per distinct kind of transition with every repetition as
/// `RDATE`.
fn derive_definition(zone: Tz) -> TimezoneDefinition {
    let first = NaiveDate::from_ymd_opt(FIRST_DERIVED_YEAR, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    let (initial, initial_dst) = utc_offset(zone, first);
    let kind = |dst: bool| if dst { ObservanceKind::Daylight } else { ObservanceKind::Standard };

    let mut observances = vec![Observance {
        kind: kind(initial_dst),
        start: first + Duration::seconds(i64::from(initial)),
        offset_from: UtcOffset::from_seconds(initial),
        offset_to: UtcOffset::from_seconds(initial),
        names: vec![abbreviation(zone, first)],
        rule: None,
        rdates: Vec::new(),
        properties: Vec::new(),
    }];

    let mut groups: HashMap<(bool, i32, i32, String), usize> = HashMap::new();
    for transition in transitions(zone) {
        let local = transition.instant + Duration::seconds(i64::from(transition.from));
        let key = (transition.dst, transition.from, transition.to, transition.name.clone());
        match groups.get(&key) {
            Some(index) => observances[*index].rdates.push(local),
            None => {
                groups.insert(key, observances.len());
                observances.push(Observance {
                    kind: kind(transition.dst),
                    start: local,
                    offset_from: UtcOffset::from_seconds(transition.from),
                    offset_to: UtcOffset::from_seconds(transition.to),
                    names: vec![transition.name],
                    rule: None,
                    rdates: Vec::new(),
                    properties: Vec::new(),
                });
            }
        }
    }

    TimezoneDefinition {
        id: zone.name().to_owned(),
        url: None,
        properties: Vec::new(),
        observances,
    }
}
