use chrono::Duration;

use crate::duration::{parse_duration, DurationError, TemporalAmount};

fn seconds(seconds: i64) -> TemporalAmount {
    TemporalAmount::Duration(Duration::seconds(seconds))
}

#[test]
fn rfc_durations() {
    assert_eq!(parse_duration("PT1H30M").unwrap(), seconds(5400));
    assert_eq!(parse_duration("P2D").unwrap(), TemporalAmount::Period { days: 2 });
    assert_eq!(parse_duration("P1W").unwrap(), TemporalAmount::Period { days: 7 });
    assert_eq!(parse_duration("-PT15M").unwrap(), seconds(-900));
    assert_eq!(parse_duration("+P1DT12H").unwrap(), seconds(129_600));
}

#[test]
fn seconds_without_time_separator() {
    assert_eq!(parse_duration("3600S").unwrap(), seconds(3600));
    assert_eq!(parse_duration("P3600S").unwrap(), seconds(3600));
    assert_eq!(parse_duration("PT3600S").unwrap(), seconds(3600));
}

#[test]
fn weeks_combined_with_days() {
    assert_eq!(parse_duration("P1W3D").unwrap(), TemporalAmount::Period { days: 10 });
    assert_eq!(parse_duration("P2W3600S").unwrap(), seconds(14 * 86_400 + 3600));
}

#[test]
fn trailing_time_separator() {
    assert_eq!(parse_duration("1DT").unwrap(), TemporalAmount::Period { days: 1 });
}

#[test]
fn components_in_any_order() {
    assert_eq!(parse_duration("P1S2M3H").unwrap(), seconds(3 * 3600 + 2 * 60 + 1));
    assert_eq!(
        parse_duration("P1S2M3H4D1W").unwrap(),
        seconds(11 * 86_400 + 3 * 3600 + 2 * 60 + 1)
    );
    assert_eq!(parse_duration("1H10S").unwrap(), seconds(3610));
}

#[test]
fn negative_mixed() {
    assert_eq!(parse_duration("-P3D4H5M6S").unwrap(), seconds(-(3 * 86_400 + 4 * 3600 + 5 * 60 + 6)));
}

#[test]
fn invalid() {
    assert_eq!(parse_duration("").unwrap_err(), DurationError::Invalid("".to_string()));
    assert_eq!(parse_duration("abc").unwrap_err(), DurationError::Invalid("abc".to_string()));
    assert_eq!(parse_duration("P1Y").unwrap_err(), DurationError::Invalid("P1Y".to_string()));
}

#[test]
fn out_of_range() {
    let text = "P99999999999999999999D";
    assert_eq!(parse_duration(text).unwrap_err(), DurationError::OutOfRange(text.to_string()));
}

#[test]
fn display() {
    assert_eq!(TemporalAmount::Period { days: -2 }.to_string(), "-P2D");
    assert_eq!(seconds(3 * 3600 + 2 * 60 + 1).to_string(), "PT3H2M1S");
    assert_eq!(seconds(-5).to_string(), "-PT5S");
    assert_eq!(seconds(0).to_string(), "PT0S");
}

#[test]
fn num_seconds() {
    assert_eq!(TemporalAmount::Period { days: 2 }.num_seconds(), 172_800);
    assert_eq!(seconds(-900).num_seconds(), -900);
}
