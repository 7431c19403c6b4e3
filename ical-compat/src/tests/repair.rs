use super::{date, date_time, vienna_catalog};
use crate::{
    event::CalendarEvent,
    repair::{EventRepairer, RepairError},
    rule::RecurrenceRule,
    value::DateValue,
};

fn recurring(start: DateValue, rule: &str) -> CalendarEvent {
    CalendarEvent {
        uid: "event@example.com".to_string(),
        start: Some(start),
        rrules: vec![rule.parse::<RecurrenceRule>().unwrap()],
        ..Default::default()
    }
}

fn repaired(mut event: CalendarEvent) -> CalendarEvent {
    EventRepairer::new(&vienna_catalog()).repair(&mut event).unwrap();
    event
}

#[test]
fn missing_start_is_fatal() {
    let mut event = CalendarEvent { uid: "1".to_string(), ..Default::default() };
    assert_eq!(
        EventRepairer::new(&vienna_catalog()).repair(&mut event).unwrap_err(),
        RepairError::MissingStart("1".to_string())
    );
}

#[test]
fn end_before_start_is_removed() {
    let event = CalendarEvent {
        uid: "1".to_string(),
        start: Some(DateValue::floating(date_time(2000, 1, 5, 0, 11, 0))),
        end: Some(DateValue::floating(date_time(2000, 1, 5, 0, 0, 0))),
        ..Default::default()
    };
    assert_eq!(repaired(event).end, None);
}

#[test]
fn end_compared_across_zones() {
    // 10:00 in Vienna is 04:00 in Toronto, so the end is after the start.
    let end = DateValue::zoned(date_time(2021, 6, 1, 5, 0, 0), "America/Toronto");
    let event = CalendarEvent {
        uid: "1".to_string(),
        start: Some(DateValue::zoned(date_time(2021, 6, 1, 10, 0, 0), "Europe/Vienna")),
        end: Some(end.clone()),
        ..Default::default()
    };
    assert_eq!(repaired(event).end, Some(end));
}

#[test]
fn until_of_all_day_event_becomes_date() {
    let event = recurring(DateValue::Date(date(2021, 11, 15)), "FREQ=DAILY;UNTIL=20211214T235959Z");
    assert_eq!(repaired(event).rrules[0].to_string(), "FREQ=DAILY;UNTIL=20211214");
}

#[test]
fn until_of_timed_event_gets_start_time() {
    let event = recurring(DateValue::utc(date_time(2011, 6, 5, 0, 11, 0)), "FREQ=DAILY;UNTIL=20211214");
    assert_eq!(repaired(event).rrules[0].to_string(), "FREQ=DAILY;UNTIL=20211214T001100Z");
}

#[test]
fn until_of_zoned_event_is_stored_in_utc() {
    let start = DateValue::zoned(date_time(2021, 6, 1, 10, 0, 0), "Europe/Vienna");
    let event = recurring(start, "FREQ=DAILY;UNTIL=20210610;BYDAY=MO,TU");
    assert_eq!(repaired(event).rrules[0].to_string(), "FREQ=DAILY;UNTIL=20210610T080000Z;BYDAY=MO,TU");
}

#[test]
fn until_of_floating_event_uses_default_zone() {
    let start = DateValue::floating(date_time(2021, 1, 4, 9, 30, 0));
    let event = recurring(start, "FREQ=WEEKLY;UNTIL=20210201");
    assert_eq!(repaired(event).rrules[0].to_string(), "FREQ=WEEKLY;UNTIL=20210201T083000Z");
}

#[test]
fn matching_until_untouched() {
    let rule = "FREQ=WEEKLY;COUNT=4";
    let event = recurring(DateValue::Date(date(2021, 11, 15)), rule);
    assert_eq!(repaired(event).rrules[0].to_string(), rule);

    let rule = "FREQ=WEEKLY;UNTIL=20211231";
    let event = recurring(DateValue::Date(date(2021, 11, 15)), rule);
    assert_eq!(repaired(event).rrules[0].to_string(), rule);
}

#[test]
fn rule_ending_before_start_is_removed() {
    let mut event = recurring(DateValue::Date(date(2021, 6, 1)), "FREQ=DAILY;UNTIL=20210501");
    event.rrules.push("FREQ=YEARLY".parse().unwrap());
    let event = repaired(event);
    assert_eq!(event.rrules.len(), 1);
    assert_eq!(event.rrules[0].to_string(), "FREQ=YEARLY");
}

#[test]
fn exceptions_are_repaired() {
    let mut main = recurring(DateValue::Date(date(2021, 11, 15)), "FREQ=DAILY");
    main.exceptions = vec![
        CalendarEvent {
            uid: "other".to_string(),
            recurrence_id: Some(DateValue::Date(date(2021, 11, 16))),
            start: Some(DateValue::Date(date(2021, 11, 17))),
            rrules: vec!["FREQ=DAILY".parse().unwrap()],
            ..Default::default()
        },
        CalendarEvent {
            recurrence_id: Some(DateValue::Date(date(2021, 11, 18))),
            ..Default::default()
        },
    ];

    let main = repaired(main);
    assert_eq!(main.exceptions.len(), 1);
    assert_eq!(main.exceptions[0].uid, "event@example.com");
    assert!(main.exceptions[0].rrules.is_empty());
}

/// Repairing a repaired event changes nothing.
#[test]
fn repair_is_idempotent() {
    let mut event = recurring(DateValue::utc(date_time(2011, 6, 5, 0, 11, 0)), "FREQ=DAILY;UNTIL=20211214");
    event.end = Some(DateValue::utc(date_time(2011, 6, 5, 0, 0, 0)));
    event.rrules.push("FREQ=DAILY;UNTIL=20100101T000000Z".parse().unwrap());

    let once = repaired(event);
    let twice = repaired(once.clone());
    assert_eq!(once, twice);
}
