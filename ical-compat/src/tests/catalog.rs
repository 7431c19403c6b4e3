use chrono::NaiveDateTime;
use std::sync::Arc;

use super::{central_european_definition, date, date_time, vienna_catalog};
use crate::{
    catalog::TimezoneCatalog,
    value::{DateValue, UtcOffset},
};

fn utc(date_time: NaiveDateTime) -> chrono::DateTime<chrono::Utc> {
    date_time.and_utc()
}

#[test]
fn platform_id_exact_ignoring_case() {
    let catalog = vienna_catalog();
    assert_eq!(catalog.platform_id("Europe/Berlin"), "Europe/Berlin");
    assert_eq!(catalog.platform_id("america/toronto"), "America/Toronto");
    assert_eq!(catalog.platform_id(" Asia/Tokyo "), "Asia/Tokyo");
}

#[test]
fn platform_id_substring() {
    let catalog = vienna_catalog();
    assert_eq!(catalog.platform_id("Vienna"), "Europe/Vienna");
    assert_eq!(catalog.platform_id("/Europe/Berlin (Germany)"), "Europe/Berlin");
}

#[test]
fn platform_id_unknown_uses_default() {
    let catalog = vienna_catalog();
    assert_eq!(catalog.platform_id("Xyz/Abc"), "Europe/Vienna");
    assert_eq!(catalog.platform_id(""), "Europe/Vienna");
}

#[test]
fn unknown_default_zone_falls_back() {
    let catalog = TimezoneCatalog::builder().default_zone("Xyz/Abc").build();
    assert!(catalog.known_ids().contains(&catalog.default_zone().name()));
}

#[test]
fn known_ids_sorted() {
    let catalog = vienna_catalog();
    let ids = catalog.known_ids();
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(ids.contains(&"Europe/Vienna"));
}

#[test]
fn utc_aliases() {
    let catalog = vienna_catalog();
    assert!(catalog.is_utc("UTC"));
    assert!(catalog.is_utc("Etc/UTC"));
    assert!(catalog.is_utc("utc"));
    assert!(!catalog.is_utc("Europe/Vienna"));
}

#[test]
fn resolve_derives_once() {
    let catalog = vienna_catalog();
    let first = catalog.resolve("Europe/Vienna");
    let second = catalog.resolve("europe/vienna");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.id, "Europe/Vienna");
    assert!(first.validate().is_ok());
}

#[test]
fn resolve_prefers_registered() {
    let catalog = TimezoneCatalog::builder()
        .default_zone("Europe/Vienna")
        .definition(central_european_definition("Custom/Zone"))
        .definition(central_european_definition("Europe/Paris"))
        .build();
    assert_eq!(catalog.resolve("custom/zone").id, "Custom/Zone");
    assert_eq!(*catalog.resolve("Europe/Paris"), central_european_definition("Europe/Paris"));
}

#[test]
fn derived_definition_offsets() {
    let catalog = vienna_catalog();
    let toronto = catalog.resolve("America/Toronto");
    let winter = toronto.offset_at(utc(date_time(2015, 1, 3, 12, 0, 0)));
    let summer = toronto.offset_at(utc(date_time(2015, 7, 4, 12, 0, 0)));
    assert_eq!(winter, Some(UtcOffset::from_seconds(-5 * 3600)));
    assert_eq!(summer, Some(UtcOffset::from_seconds(-4 * 3600)));
}

#[test]
fn canonicalize_renames_agreeing_definition() {
    let catalog = vienna_catalog();
    let definition = central_european_definition("Vienna");
    let canonical = catalog.canonicalize(&definition, "Europe/Vienna");
    assert_eq!(canonical.id, "Europe/Vienna");
    assert_eq!(canonical.observances, definition.observances);
}

#[test]
fn canonicalize_keeps_disagreeing_definition() {
    let catalog = vienna_catalog();
    let definition = central_european_definition("Vienna");
    assert_eq!(catalog.canonicalize(&definition, "America/Toronto").id, "Vienna");
    assert_eq!(catalog.canonicalize(&definition, "Xyz/Abc").id, "Vienna");
}

#[test]
fn to_utc_conversions() {
    let catalog = vienna_catalog();
    assert_eq!(
        catalog.to_utc(&DateValue::Date(date(2021, 6, 1))),
        utc(date_time(2021, 6, 1, 0, 0, 0))
    );
    assert_eq!(
        catalog.to_utc(&DateValue::utc(date_time(2021, 6, 1, 10, 0, 0))),
        utc(date_time(2021, 6, 1, 10, 0, 0))
    );
    assert_eq!(
        catalog.to_utc(&DateValue::zoned(date_time(2021, 6, 1, 10, 0, 0), "America/Toronto")),
        utc(date_time(2021, 6, 1, 14, 0, 0))
    );
    assert_eq!(
        catalog.to_utc(&DateValue::floating(date_time(2021, 6, 1, 10, 0, 0))),
        utc(date_time(2021, 6, 1, 8, 0, 0))
    );
}

#[test]
fn to_utc_across_transitions() {
    let catalog = vienna_catalog();
    // Skipped by the spring transition.
    assert_eq!(
        catalog.to_utc(&DateValue::zoned(date_time(2021, 3, 28, 2, 30, 0), "Europe/Vienna")),
        utc(date_time(2021, 3, 28, 1, 30, 0))
    );
    // Repeated by the autumn transition: the earlier instant.
    assert_eq!(
        catalog.to_utc(&DateValue::zoned(date_time(2021, 10, 31, 2, 30, 0), "Europe/Vienna")),
        utc(date_time(2021, 10, 31, 0, 30, 0))
    );
}

#[test]
fn to_zone() {
    let catalog = vienna_catalog();
    assert_eq!(
        catalog.to_zone(utc(date_time(2015, 7, 4, 9, 30, 40)), "America/Toronto"),
        date_time(2015, 7, 4, 5, 30, 40)
    );
}
