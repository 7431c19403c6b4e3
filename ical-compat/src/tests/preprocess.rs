use std::io::{BufReader, Cursor, Read};

use crate::preprocess::{
    FixInvalidDayOffset, FixInvalidUtcOffset, FixMissingTPrefix, Preprocessed, Preprocessor,
    StreamPreprocessor,
};

#[test]
fn utc_offset_missing_hours() {
    let rule = FixInvalidUtcOffset;
    assert!(rule.matches("TZOFFSETFROM:+5730"));
    assert_eq!(rule.fix_string("TZOFFSETFROM:+5730"), "TZOFFSETFROM:+005730");
    assert_eq!(rule.fix_string("TZOFFSETTO:-1959"), "TZOFFSETTO:-001959");
}

#[test]
fn utc_offset_valid_untouched() {
    let rule = FixInvalidUtcOffset;
    assert!(!rule.matches("TZOFFSETFROM:+0100"));
    assert!(!rule.matches("TZOFFSETTO:+1200"));
    assert!(!rule.matches("TZOFFSETFROM:+005730"));
}

#[test]
fn day_offset_after_time_separator() {
    let rule = FixInvalidDayOffset;
    assert_eq!(rule.fix_string("DURATION:-P2DT"), "DURATION:-P2D");
    assert_eq!(rule.fix_string("TRIGGER:PT1D"), "TRIGGER:P1D");
    assert_eq!(rule.fix_string("TRIGGER;VALUE=DURATION:-PT1D"), "TRIGGER;VALUE=DURATION:-P1D");
    assert!(!rule.matches("DURATION:P1DT2H"));
}

#[test]
fn missing_time_prefix() {
    let rule = FixMissingTPrefix;
    assert_eq!(rule.fix_string("TRIGGER:-P5S"), "TRIGGER:-PT5S");
    assert_eq!(rule.fix_string("DURATION:P15M"), "DURATION:PT15M");
    assert!(!rule.matches("DURATION:PT5S"));
    assert!(!rule.matches("DURATION:P5D"));
}

/// Only complete lines are rewritten; everything else is left byte for byte.
#[test]
fn rules_are_line_oriented() {
    let text = "BEGIN:VALARM\r\nTRIGGER:-P5S\r\nDESCRIPTION:TRIGGER:-P5S\r\nEND:VALARM\r\n";
    assert_eq!(
        FixMissingTPrefix.fix_string(text),
        "BEGIN:VALARM\r\nTRIGGER:-PT5S\r\nDESCRIPTION:TRIGGER:-P5S\r\nEND:VALARM\r\n"
    );
}

#[test]
fn chain_applies_all_rules() {
    let text = "TZOFFSETFROM:+5730\r\nDURATION:-P2DT\r\nTRIGGER:-P5S\r\n";
    assert_eq!(
        Preprocessor::default().preprocess(text),
        "TZOFFSETFROM:+005730\r\nDURATION:-P2D\r\nTRIGGER:-PT5S\r\n"
    );
}

#[test]
fn chain_borrows_clean_input() {
    let text = "BEGIN:VEVENT\r\nDURATION:PT1H\r\nEND:VEVENT\r\n";
    assert!(matches!(Preprocessor::default().preprocess(text), std::borrow::Cow::Borrowed(_)));
}

#[test]
fn chain_without_rules() {
    let text = "TRIGGER:-P5S\r\n";
    assert_eq!(Preprocessor::empty().preprocess(text), text);
    assert_eq!(Preprocessor::empty().with_rule(FixMissingTPrefix).preprocess(text), "TRIGGER:-PT5S\r\n");
}

#[test]
fn seekable_clean_input_is_rewound() {
    let reader = Cursor::new(b"BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n".to_vec());
    let preprocessed = Preprocessor::default().preprocess_seekable(reader).unwrap();
    let Preprocessed::Original(mut reader) = preprocessed else {
        panic!("clean input must not be rewritten");
    };
    let mut text = String::new();
    reader.read_to_string(&mut text).unwrap();
    assert_eq!(text, "BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n");
}

#[test]
fn seekable_input_is_fixed() {
    let reader = BufReader::new(Cursor::new(b"BEGIN:VALARM\r\nTRIGGER:-P5S\r\nEND:VALARM\r\n".to_vec()));
    let mut preprocessed = Preprocessor::default().preprocess_seekable(reader).unwrap();
    assert!(matches!(preprocessed, Preprocessed::Fixed(_)));
    let mut text = String::new();
    preprocessed.read_to_string(&mut text).unwrap();
    assert_eq!(text, "BEGIN:VALARM\r\nTRIGGER:-PT5S\r\nEND:VALARM\r\n");
}

#[test]
fn non_seekable_input_is_fixed() {
    let reader: &[u8] = b"DURATION:-P2DT\r\n";
    assert_eq!(Preprocessor::default().preprocess_reader(reader).unwrap(), "DURATION:-P2D\r\n");
}
