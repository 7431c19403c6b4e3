use super::{date, date_time, vienna_catalog};
use crate::{
    recurrence_set::{decode, encode, RecurrenceDateList, RecurrenceSetError},
    value::DateValue,
};

#[test]
fn encode_in_zone_of_first_value() {
    let catalog = vienna_catalog();
    let lists = [
        RecurrenceDateList::new(vec![DateValue::zoned(
            date_time(2015, 1, 3, 11, 30, 30),
            "America/Toronto",
        )]),
        RecurrenceDateList::new(vec![DateValue::zoned(
            date_time(2015, 7, 4, 11, 30, 40),
            "Europe/Berlin",
        )]),
    ];
    assert_eq!(
        encode(&lists, false, &catalog),
        "America/Toronto;20150103T113030,20150704T053040"
    );
}

#[test]
fn encode_utc_first() {
    let catalog = vienna_catalog();
    let lists = [RecurrenceDateList::new(vec![
        DateValue::utc(date_time(2015, 1, 3, 11, 30, 30)),
        DateValue::zoned(date_time(2015, 7, 4, 11, 30, 40), "Europe/Berlin"),
    ])];
    assert_eq!(encode(&lists, false, &catalog), "20150103T113030Z,20150704T093040Z");
}

#[test]
fn encode_all_day() {
    let catalog = vienna_catalog();
    let lists = [RecurrenceDateList::new(vec![
        DateValue::Date(date(2015, 1, 1)),
        DateValue::utc(date_time(2015, 7, 2, 0, 0, 0)),
    ])];
    assert_eq!(encode(&lists, true, &catalog), "20150101T000000Z,20150702T000000Z");
}

#[test]
fn encode_drops_periods() {
    let catalog = vienna_catalog();
    let lists = [
        RecurrenceDateList {
            dates: Vec::new(),
            periods: vec!["19960403T020000Z/19960403T040000Z".to_string()],
        },
        RecurrenceDateList::new(vec![DateValue::utc(date_time(2015, 1, 3, 11, 30, 30))]),
    ];
    assert_eq!(encode(&lists, false, &catalog), "20150103T113030Z");
    assert_eq!(encode(&lists[..1], false, &catalog), "");
}

#[test]
fn decode_all_day() {
    let catalog = vienna_catalog();
    let list = decode("20150101T103010Z,20150702T103020Z", true, None, &catalog).unwrap();
    assert_eq!(
        list.dates,
        vec![DateValue::Date(date(2015, 1, 1)), DateValue::Date(date(2015, 7, 2))]
    );
}

#[test]
fn decode_with_zone_and_exclusion() {
    let catalog = vienna_catalog();
    // 20150103T113030 in Toronto.
    let exclude = chrono::DateTime::from_timestamp(1_420_302_630, 0).unwrap();
    let list = decode(
        "America/Toronto;20150103T113030,20150704T113040",
        false,
        Some(exclude),
        &catalog,
    )
    .unwrap();
    assert_eq!(
        list.dates,
        vec![DateValue::zoned(date_time(2015, 7, 4, 11, 30, 40), "America/Toronto")]
    );
}

#[test]
fn decode_without_zone() {
    let catalog = vienna_catalog();
    let list = decode("UTC;20150103T113030Z", false, None, &catalog).unwrap();
    assert_eq!(list.dates, vec![DateValue::utc(date_time(2015, 1, 3, 11, 30, 30))]);
}

#[test]
fn decode_invalid_token() {
    let catalog = vienna_catalog();
    assert_eq!(
        decode("20150103T113030Z,garbage", false, None, &catalog).unwrap_err(),
        RecurrenceSetError::InvalidToken("garbage".to_string())
    );
}

/// Decoding an encoded list gives back the same instants.
#[test]
fn round_trip() {
    let catalog = vienna_catalog();
    let values = vec![
        DateValue::zoned(date_time(2015, 1, 3, 11, 30, 30), "America/Toronto"),
        DateValue::zoned(date_time(2015, 7, 4, 11, 30, 40), "Europe/Berlin"),
        DateValue::utc(date_time(2016, 2, 29, 23, 0, 0)),
    ];
    let encoded = encode(&[RecurrenceDateList::new(values.clone())], false, &catalog);
    let decoded = decode(&encoded, false, None, &catalog).unwrap();

    let instants = |values: &[DateValue]| -> Vec<_> { values.iter().map(|v| catalog.to_utc(v)).collect() };
    assert_eq!(instants(&decoded.dates), instants(&values));
    assert!(decoded.dates.iter().all(|value| value.tzid() == Some("America/Toronto")));
}
