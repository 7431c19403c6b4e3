//! Turning repaired events back into a [`Calendar`] that strict consumers accept.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::warn;

use crate::{
    catalog::TimezoneCatalog,
    config::Settings,
    event::CalendarEvent,
    minify::minify,
    repair::{EventRepairer, RepairError},
    timezone::TimezoneDefinition,
    value::{DateValue, TimeKind},
    Calendar,
};

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ExportError {
    #[error("Event {0} has duplicate `uid`")]
    DuplicateUid(String),
    #[error(transparent)]
    Repair(#[from] RepairError),
}

/// Build a calendar from `events`.
///
/// `supplied` are the `VTIMEZONE`s that came with the events; they are preferred over the
/// catalog's definitions when they describe the same zone.
pub fn export(
    events: &[CalendarEvent],
    supplied: &[TimezoneDefinition],
    catalog: &TimezoneCatalog,
    settings: &Settings,
) -> Result<Calendar, ExportError> {
    let repairer = EventRepairer::new(catalog);
    let now = Utc::now();

    let mut uids = HashSet::new();
    let mut exported = Vec::with_capacity(events.len());
    for event in events {
        if !uids.insert(event.uid.as_str()) {
            return Err(ExportError::DuplicateUid(event.uid.clone()));
        }

        let mut event = event.clone();
        repairer.repair(&mut event)?;
        retain_matching_exceptions(&mut event, catalog);

        event.stamp = Some(now);
        for exception in &mut event.exceptions {
            exception.stamp = Some(now);
        }
        exported.push(event);
    }

    // Earliest start per referenced zone.
    let mut references: BTreeMap<String, Option<DateTime<Utc>>> = BTreeMap::new();
    for event in &exported {
        let earliest = std::iter::once(event)
            .chain(&event.exceptions)
            .filter_map(|e| e.start.as_ref())
            .map(|start| catalog.to_utc(start))
            .min();
        for tzid in event.timezone_ids() {
            let reference = references.entry(tzid.to_owned()).or_insert(earliest);
            *reference = match (*reference, earliest) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }
    }

    let timezones = references
        .into_iter()
        .map(|(tzid, reference)| {
            let definition = timezone_definition(&tzid, supplied, catalog);
            if settings.minify_timezones {
                minify(&definition, reference)
            } else {
                definition
            }
        })
        .collect();

    Ok(Calendar {
        product_id: settings.product_id.clone(),
        properties: Vec::new(),
        timezones,
        events: exported,
    })
}

/// Drop exceptions that can't be matched to an instance of `event` and express the remaining
/// `RECURRENCE-ID`s in the zone of the main event's start.
fn retain_matching_exceptions(event: &mut CalendarEvent, catalog: &TimezoneCatalog) {
    let Some(start) = event.start.clone() else { return };
    let uid = event.uid.clone();
    let all_day = event.is_all_day();

    event.exceptions.retain_mut(|exception| {
        let Some(recurrence_id) = &exception.recurrence_id else {
            warn!(uid = %uid, "dropping exception without RECURRENCE-ID");
            return false;
        };
        if recurrence_id.is_date() != all_day {
            warn!(uid = %uid, recurrence_id = %recurrence_id, "dropping exception with RECURRENCE-ID of other type than DTSTART");
            return false;
        }

        if let DateValue::DateTime(_, kind) = &start {
            let instant = catalog.to_utc(recurrence_id);
            exception.recurrence_id = Some(match kind {
                TimeKind::Utc => DateValue::utc(instant.naive_utc()),
                TimeKind::Zoned(tzid) => DateValue::zoned(catalog.to_zone(instant, tzid), tzid),
                TimeKind::Floating => DateValue::floating(
                    instant.with_timezone(&catalog.default_zone()).naive_local(),
                ),
            });
        }
        true
    });
}

/// Definition to write for `tzid`: a supplied one when it agrees with the platform zone of that
/// name, otherwise the catalog's.
fn timezone_definition(
    tzid: &str,
    supplied: &[TimezoneDefinition],
    catalog: &TimezoneCatalog,
) -> TimezoneDefinition {
    let candidate = supplied
        .iter()
        .find(|definition| definition.id == tzid)
        .or_else(|| supplied.iter().find(|definition| catalog.platform_id(&definition.id) == tzid));

    if let Some(definition) = candidate {
        let canonical = catalog.canonicalize(definition, tzid);
        if canonical.id == tzid {
            return canonical;
        }
    }
    TimezoneDefinition::clone(&catalog.resolve(tzid))
}
