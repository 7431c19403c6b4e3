use chrono_tz::Tz;

use crate::config::Settings;

#[test]
fn defaults() {
    let settings: Settings = toml::from_str("").unwrap();
    assert_eq!(settings, Settings::default());
    assert!(settings.minify_timezones);
    assert_eq!(settings.default_timezone, None);
}

#[test]
fn from_toml() {
    let settings: Settings = toml::from_str(
        r#"
        default_timezone = "Europe/Vienna"
        minify_timezones = false
        product_id = "-//Example//Sync//EN"
        "#,
    )
    .unwrap();
    assert_eq!(
        settings,
        Settings {
            default_timezone: Some("Europe/Vienna".to_string()),
            minify_timezones: false,
            product_id: Some("-//Example//Sync//EN".to_string()),
        }
    );
    assert_eq!(settings.catalog().default_zone(), Tz::Europe__Vienna);
}

#[test]
fn invalid_field_type() {
    assert!(toml::from_str::<Settings>("minify_timezones = \"yes\"").is_err());
}
