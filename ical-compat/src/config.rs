use serde::Deserialize;

use crate::catalog::TimezoneCatalog;

/// Options of a conversion run.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Zone for floating times and unknown identifiers. The host zone when absent.
    pub default_timezone: Option<String>,
    /// Reduce written `VTIMEZONE`s to the observances the events need.
    pub minify_timezones: bool,
    /// `PRODID` of written calendars.
    pub product_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings { default_timezone: None, minify_timezones: true, product_id: None }
    }
}

impl Settings {
    pub fn catalog(&self) -> TimezoneCatalog {
        let builder = TimezoneCatalog::builder();
        match &self.default_timezone {
            Some(zone) => builder.default_zone(zone.clone()),
            None => builder,
        }
        .build()
    }
}
