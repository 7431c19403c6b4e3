//! Semantic repairs applied to every event after reading and before writing.
//!
//! Servers and clients produce events that are syntactically fine but inconsistent: an end before
//! the start, an `UNTIL` of a different value type than `DTSTART`, rules that end before they
//! begin. These are corrected (with a warning) so that the result is accepted by strict
//! consumers. Only a missing or unusable start is fatal.

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    catalog::{local_to_utc, TimezoneCatalog},
    event::CalendarEvent,
    value::{DateValue, TimeKind},
};

#[derive(Debug, Error, Eq, PartialEq)]
pub enum RepairError {
    #[error("Event {0} has no start time (`DTSTART`)")]
    MissingStart(String),
    #[error("Event {uid} has a start time that is neither DATE nor DATE-TIME: `{value}`")]
    InvalidStart { uid: String, value: String },
}

/// Applies the repair passes to events; holds no state besides the catalog used to compare
/// times of different zones.
pub struct EventRepairer<'a> {
    catalog: &'a TimezoneCatalog,
}

impl<'a> EventRepairer<'a> {
    pub fn new(catalog: &'a TimezoneCatalog) -> Self {
        EventRepairer { catalog }
    }

    /// Repair `event` and its exceptions in place.
    ///
    /// Fails only if the main event has no start. Exceptions take over the main event's `uid`
    /// and lose their recurrence rules; an exception that can't be repaired is dropped.
    pub fn repair(&self, event: &mut CalendarEvent) -> Result<(), RepairError> {
        self.repair_single(event)?;

        let uid = event.uid.clone();
        event.exceptions.retain_mut(|exception| {
            exception.uid.clone_from(&uid);
            if !exception.rrules.is_empty() {
                warn!(uid = %uid, "removing recurrence rules of exception");
                exception.rrules.clear();
            }
            match self.repair_single(exception) {
                Ok(_) => true,
                Err(e) => {
                    warn!(uid = %uid, error = %e, "dropping exception that can't be repaired");
                    false
                }
            }
        });

        Ok(())
    }

    fn repair_single(&self, event: &mut CalendarEvent) -> Result<DateValue, RepairError> {
        let start = self.correct_start_and_end(event)?;
        self.align_until_with_start(event, &start);
        self.remove_rules_ending_before_start(event, &start);
        Ok(start)
    }

    /// The event must have a start. An end before the start is removed.
    pub(crate) fn correct_start_and_end(
        &self,
        event: &mut CalendarEvent,
    ) -> Result<DateValue, RepairError> {
        let start = event.start.clone().ok_or_else(|| RepairError::MissingStart(event.uid.clone()))?;

        if let Some(end) = &event.end {
            if self.catalog.to_utc(&start) > self.catalog.to_utc(end) {
                warn!(uid = %event.uid, start = %start, end = %end, "DTSTART after DTEND, removing DTEND");
                event.end = None;
            }
        }

        Ok(start)
    }

    /// Give `UNTIL` the value type of `DTSTART`.
    ///
    /// A date-time `UNTIL` of an all-day event is cut down to its calendar day as written. A
    /// date `UNTIL` of a timed event gets the start's time of day in the start's zone and is
    /// then stored in UTC.
    pub(crate) fn align_until_with_start(&self, event: &mut CalendarEvent, start: &DateValue) {
        for rule in &mut event.rrules {
            let Some(until) = &rule.until else { continue };

            let aligned = match (start, until) {
                (DateValue::Date(_), DateValue::DateTime(until, _)) => {
                    warn!(uid = %event.uid, "DTSTART is a DATE but UNTIL a DATE-TIME, making UNTIL a DATE");
                    DateValue::Date(until.date())
                }
                (DateValue::DateTime(start_time, kind), DateValue::Date(until)) => {
                    warn!(uid = %event.uid, "DTSTART is a DATE-TIME but UNTIL a DATE, copying time of DTSTART to UNTIL");
                    let local = NaiveDateTime::new(*until, start_time.time());
                    let instant = match kind {
                        TimeKind::Utc => local.and_utc(),
                        TimeKind::Zoned(tzid) => local_to_utc(self.catalog.zone(tzid), local),
                        TimeKind::Floating => local_to_utc(self.catalog.default_zone(), local),
                    };
                    DateValue::utc(instant.naive_utc())
                }
                _ => continue,
            };

            let previous = rule.to_string();
            rule.until = Some(aligned);
            info!(uid = %event.uid, was = %previous, now = %rule, "replaced recurrence rule");
        }
    }

    /// Drop rules whose `UNTIL` lies before `DTSTART`; they can't produce any occurrence.
    pub(crate) fn remove_rules_ending_before_start(
        &self,
        event: &mut CalendarEvent,
        start: &DateValue,
    ) {
        let start = self.catalog.to_utc(start);
        let catalog = self.catalog;
        let uid = &event.uid;
        event.rrules.retain(|rule| match &rule.until {
            Some(until) if catalog.to_utc(until) < start => {
                warn!(uid = %uid, rule = %rule, "removing recurrence rule with UNTIL before DTSTART");
                false
            }
            _ => true,
        });
    }
}
