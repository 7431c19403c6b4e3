//! Reading iCalendar text into [`CalendarEvent`]s and [`TimezoneDefinition`]s.
//!
//! Input goes through the [`Preprocessor`] before the grammar parser sees it, so that the known
//! syntax errors of real-world producers don't fail the whole calendar. Every event is repaired
//! after reading; events that can't be repaired are reported in [`Import::rejected`] instead of
//! aborting the batch.

use icalendar::parser::{read_calendar, unfold, Component, Property};
use std::{collections::HashMap, io::Read, str::FromStr};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    catalog::TimezoneCatalog,
    duration::parse_duration,
    event::{CalendarEvent, Status, Transparency},
    preprocess::Preprocessor,
    property::{RawComponent, RawProperty},
    recurrence_set::RecurrenceDateList,
    repair::{EventRepairer, RepairError},
    rule::RecurrenceRule,
    timezone::TimezoneDefinition,
    value::{DateValue, TimeKind},
};

/// Calendar properties that are taken over from the input.
pub const CALENDAR_PROPERTIES: [&str; 3] = ["X-WR-CALNAME", "X-APPLE-CALENDAR-COLOR", "COLOR"];

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to read calendar: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse calendar: {0}")]
    Syntax(String),
}

/// An event that was read but couldn't be repaired.
#[derive(Debug, Eq, PartialEq)]
pub struct RejectedEvent {
    pub uid: String,
    pub error: RepairError,
}

/// Everything taken over from one iCalendar stream.
#[derive(Debug, Default)]
pub struct Import {
    /// Kept calendar properties, see [`CALENDAR_PROPERTIES`].
    pub properties: Vec<RawProperty>,
    pub timezones: Vec<TimezoneDefinition>,
    /// Main events, each with its exceptions.
    pub events: Vec<CalendarEvent>,
    pub rejected: Vec<RejectedEvent>,
}

/// Read a calendar from `reader`.
pub fn import_reader<R: Read>(reader: R, catalog: &TimezoneCatalog) -> Result<Import, ParseError> {
    let text = Preprocessor::default().preprocess_reader(reader)?;
    import_preprocessed(&text, catalog)
}

/// Read a calendar from `text`.
pub fn import(text: &str, catalog: &TimezoneCatalog) -> Result<Import, ParseError> {
    let text = Preprocessor::default().preprocess(text);
    import_preprocessed(&text, catalog)
}

fn import_preprocessed(text: &str, catalog: &TimezoneCatalog) -> Result<Import, ParseError> {
    let unfolded = unfold(text);
    let calendar = read_calendar(&unfolded).map_err(|e| ParseError::Syntax(e.to_string()))?;

    let mut components = Vec::new();
    for component in &calendar.components {
        collect_components(component, &mut components);
    }

    let mut import = Import { properties: calendar_properties(&unfolded), ..Default::default() };

    for component in components.iter().filter(|c| c.name == "VTIMEZONE") {
        match TimezoneDefinition::from_component(component) {
            Ok(definition) => import.timezones.push(definition),
            Err(e) => warn!(error = %e, "ignoring invalid VTIMEZONE"),
        }
    }

    let mut events = Vec::new();
    for component in components.iter().filter(|c| c.name == "VEVENT") {
        match event_from_component(component, catalog) {
            Ok(event) => events.push(event),
            Err((uid, error)) => {
                warn!(uid = %uid, error = %error, "rejecting event");
                import.rejected.push(RejectedEvent { uid, error });
            }
        }
    }

    let repairer = EventRepairer::new(catalog);
    for mut event in group_by_uid(events) {
        match repairer.repair(&mut event) {
            Ok(()) => import.events.push(event),
            Err(error) => {
                warn!(uid = %event.uid, error = %error, "rejecting event");
                import.rejected.push(RejectedEvent { uid: event.uid, error });
            }
        }
    }

    Ok(import)
}

/// Flatten the parser's tree into [`RawComponent`]s, looking through a `VCALENDAR` wrapper.
fn collect_components(component: &Component<'_>, out: &mut Vec<RawComponent>) {
    let component = raw_component(component);
    if component.name == "VCALENDAR" {
        out.extend(component.components);
    } else {
        out.push(component);
    }
}

fn raw_component(component: &Component<'_>) -> RawComponent {
    RawComponent {
        name: component.name.to_string().to_ascii_uppercase(),
        properties: component.properties.iter().map(raw_property).collect(),
        components: component.components.iter().map(raw_component).collect(),
    }
}

fn raw_property(property: &Property<'_>) -> RawProperty {
    RawProperty {
        name: property.name.to_string().to_ascii_uppercase(),
        params: property
            .params
            .iter()
            .map(|param| {
                let value = param.val.as_ref().map(|v| v.to_string()).unwrap_or_default();
                (param.key.to_string().to_ascii_uppercase(), value)
            })
            .collect(),
        value: property.val.to_string(),
    }
}

/// Kept properties directly inside `VCALENDAR`, from unfolded content lines.
fn calendar_properties(unfolded: &str) -> Vec<RawProperty> {
    let mut depth = 0usize;
    let mut properties = Vec::new();
    for line in unfolded.lines().map(|line| line.trim_end_matches('\r')) {
        let Some((head, value)) = line.split_once(':') else { continue };
        let name = head.split(';').next().unwrap_or(head).trim().to_ascii_uppercase();
        match name.as_str() {
            "BEGIN" => depth += 1,
            "END" => depth = depth.saturating_sub(1),
            _ if depth == 1 && CALENDAR_PROPERTIES.contains(&name.as_str()) => {
                properties.push(RawProperty::new(name, value));
            }
            _ => {}
        }
    }
    properties
}

/// `VEVENT` properties the bridge interprets.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum PropertyKind {
    Uid,
    Sequence,
    RecurrenceId,
    Start,
    End,
    Duration,
    RecurrenceRule,
    ExceptionRule,
    RecurrenceDates,
    ExceptionDates,
    Summary,
    Location,
    Description,
    Url,
    Status,
    Class,
    Transparency,
    Organizer,
    Attendee,
    Categories,
    LastModified,
    /// Set again on export.
    Ignored,
    Other,
}

impl PropertyKind {
    fn of(name: &str) -> Self {
        match name {
            "UID" => PropertyKind::Uid,
            "SEQUENCE" => PropertyKind::Sequence,
            "RECURRENCE-ID" => PropertyKind::RecurrenceId,
            "DTSTART" => PropertyKind::Start,
            "DTEND" => PropertyKind::End,
            "DURATION" => PropertyKind::Duration,
            "RRULE" => PropertyKind::RecurrenceRule,
            "EXRULE" => PropertyKind::ExceptionRule,
            "RDATE" => PropertyKind::RecurrenceDates,
            "EXDATE" => PropertyKind::ExceptionDates,
            "SUMMARY" => PropertyKind::Summary,
            "LOCATION" => PropertyKind::Location,
            "DESCRIPTION" => PropertyKind::Description,
            "URL" => PropertyKind::Url,
            "STATUS" => PropertyKind::Status,
            "CLASS" => PropertyKind::Class,
            "TRANSP" => PropertyKind::Transparency,
            "ORGANIZER" => PropertyKind::Organizer,
            "ATTENDEE" => PropertyKind::Attendee,
            "CATEGORIES" => PropertyKind::Categories,
            "LAST-MODIFIED" => PropertyKind::LastModified,
            "DTSTAMP" | "PRODID" => PropertyKind::Ignored,
            _ => PropertyKind::Other,
        }
    }
}

/// Date value of `property`, with its `TZID` mapped to the platform identifier.
fn date_value(property: &RawProperty, catalog: &TimezoneCatalog) -> Option<DateValue> {
    date_values(property, catalog).and_then(|mut values| values.pop())
}

fn date_values(property: &RawProperty, catalog: &TimezoneCatalog) -> Option<Vec<DateValue>> {
    let tzid = property.param("TZID").map(str::trim).filter(|tzid| !tzid.is_empty());
    let platform_id = tzid.map(|tzid| catalog.platform_id(tzid));

    match DateValue::parse_list(&property.value, platform_id) {
        Ok(values) => Some(
            values
                .into_iter()
                .map(|value| match value {
                    DateValue::DateTime(date_time, TimeKind::Zoned(tzid)) if catalog.is_utc(&tzid) => {
                        DateValue::utc(date_time)
                    }
                    value => value,
                })
                .collect(),
        ),
        Err(e) => {
            warn!(property = %property.name, error = %e, "ignoring invalid date value");
            None
        }
    }
}

fn rule(property: &RawProperty) -> Option<RecurrenceRule> {
    RecurrenceRule::from_str(&property.value)
        .map_err(|e| warn!(property = %property.name, error = %e, "ignoring invalid recurrence rule"))
        .ok()
}

fn date_list(property: &RawProperty, catalog: &TimezoneCatalog) -> Option<RecurrenceDateList> {
    if property.param("VALUE").is_some_and(|value| value.eq_ignore_ascii_case("PERIOD")) {
        let periods = property.value.split(',').map(str::trim).filter(|p| !p.is_empty());
        return Some(RecurrenceDateList {
            dates: Vec::new(),
            periods: periods.map(str::to_owned).collect(),
        });
    }
    date_values(property, catalog).map(RecurrenceDateList::new)
}

/// Interpret one `VEVENT`. Fails (with the event's `UID`) only if `DTSTART` is unusable.
fn event_from_component(
    component: &RawComponent,
    catalog: &TimezoneCatalog,
) -> Result<CalendarEvent, (String, RepairError)> {
    let uid = match component.property("UID").map(|uid| uid.value.trim()) {
        Some(uid) if !uid.is_empty() => uid.to_owned(),
        _ => {
            let uid = Uuid::new_v4().to_string();
            warn!(uid = %uid, "found VEVENT without UID, using a random one");
            uid
        }
    };

    let mut event = CalendarEvent { uid: uid.clone(), ..Default::default() };
    for property in &component.properties {
        match PropertyKind::of(&property.name) {
            PropertyKind::Uid | PropertyKind::Ignored => {}
            PropertyKind::Sequence => match property.value.trim().parse() {
                Ok(sequence) => event.sequence = sequence,
                Err(_) => warn!(uid = %uid, value = %property.value, "ignoring invalid SEQUENCE"),
            },
            PropertyKind::RecurrenceId => event.recurrence_id = date_value(property, catalog),
            PropertyKind::Start => match date_value(property, catalog) {
                Some(start) => event.start = Some(start),
                None => {
                    let value = property.value.clone();
                    return Err((uid.clone(), RepairError::InvalidStart { uid, value }));
                }
            },
            PropertyKind::End => event.end = date_value(property, catalog),
            PropertyKind::Duration => match parse_duration(&property.value) {
                Ok(duration) => event.duration = Some(duration),
                Err(e) => warn!(uid = %uid, error = %e, "ignoring invalid DURATION"),
            },
            PropertyKind::RecurrenceRule => event.rrules.extend(rule(property)),
            PropertyKind::ExceptionRule => event.exrules.extend(rule(property)),
            PropertyKind::RecurrenceDates => event.rdates.extend(date_list(property, catalog)),
            PropertyKind::ExceptionDates => event.exdates.extend(date_list(property, catalog)),
            PropertyKind::Summary => event.summary = Some(property.value.clone()),
            PropertyKind::Location => event.location = Some(property.value.clone()),
            PropertyKind::Description => event.description = Some(property.value.clone()),
            PropertyKind::Url => event.url = Some(property.value.clone()),
            PropertyKind::Status => match Status::from_str(&property.value) {
                Ok(status) => event.status = Some(status),
                Err(()) => event.unknown_properties.push(property.clone()),
            },
            PropertyKind::Class => event.classification = Some(property.value.clone()),
            PropertyKind::Transparency => match Transparency::from_str(&property.value) {
                Ok(transparency) => event.transparency = Some(transparency),
                Err(()) => event.unknown_properties.push(property.clone()),
            },
            PropertyKind::Organizer => event.organizer = Some(property.clone()),
            PropertyKind::Attendee => event.attendees.push(property.clone()),
            PropertyKind::Categories => event.categories.extend(
                property.value.split(',').map(str::trim).filter(|c| !c.is_empty()).map(str::to_owned),
            ),
            PropertyKind::LastModified => event.last_modified = date_value(property, catalog),
            PropertyKind::Other => event.unknown_properties.push(property.clone()),
        }
    }

    for child in &component.components {
        if child.name == "VALARM" {
            event.alarms.push(child.clone());
        } else {
            debug!(uid = %uid, component = %child.name, "ignoring component inside VEVENT");
        }
    }

    Ok(event)
}

/// Replace `slot` by `candidate` unless `slot` has a higher `SEQUENCE`.
fn keep_latest(slot: &mut CalendarEvent, candidate: CalendarEvent) {
    if candidate.sequence >= slot.sequence {
        *slot = candidate;
    }
}

/// Assign exceptions to their main events. Of several versions of the same event, the one with
/// the highest `SEQUENCE` wins; on a tie, the later one.
fn group_by_uid(events: Vec<CalendarEvent>) -> Vec<CalendarEvent> {
    let mut mains: Vec<CalendarEvent> = Vec::new();
    let mut main_index: HashMap<String, usize> = HashMap::new();
    let mut exceptions: Vec<(String, Vec<CalendarEvent>)> = Vec::new();
    let mut exception_index: HashMap<String, usize> = HashMap::new();

    for event in events {
        match &event.recurrence_id {
            None => match main_index.get(&event.uid) {
                Some(&index) => keep_latest(&mut mains[index], event),
                None => {
                    main_index.insert(event.uid.clone(), mains.len());
                    mains.push(event);
                }
            },
            Some(recurrence_id) => {
                let index = *exception_index.entry(event.uid.clone()).or_insert_with(|| {
                    exceptions.push((event.uid.clone(), Vec::new()));
                    exceptions.len() - 1
                });
                let instances = &mut exceptions[index].1;
                match instances.iter().position(|e| e.recurrence_id.as_ref() == Some(recurrence_id)) {
                    Some(existing) => keep_latest(&mut instances[existing], event),
                    None => instances.push(event),
                }
            }
        }
    }

    for (uid, instances) in exceptions {
        let index = match main_index.get(&uid) {
            Some(&index) => index,
            None => {
                info!(uid = %uid, count = instances.len(), "no main event, only exceptions");
                let Some(first) = instances.first() else { continue };
                let mut main = first.clone();
                main.recurrence_id = None;
                mains.push(main);
                mains.len() - 1
            }
        };

        let main = &mut mains[index];
        for mut exception in instances {
            if exception.summary.is_none() {
                exception.summary.clone_from(&main.summary);
            }
            main.exceptions.push(exception);
        }
    }

    mains
}
