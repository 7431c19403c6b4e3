use std::{fmt, str::FromStr};

use crate::value::{DateValue, ValueError};

/// Unit of time that recurrence happens on.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Frequency {
    /// Every year.
    Yearly,
    /// Every month.
    Monthly,
    /// Every week.
    #[default]
    Weekly,
    /// Every day.
    Daily,
    /// Every hour.
    Hourly,
    /// Every minute.
    Minutely,
    /// Every second.
    Secondly,
}

impl FromStr for Frequency {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "YEARLY" => Ok(Frequency::Yearly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "WEEKLY" => Ok(Frequency::Weekly),
            "DAILY" => Ok(Frequency::Daily),
            "HOURLY" => Ok(Frequency::Hourly),
            "MINUTELY" => Ok(Frequency::Minutely),
            "SECONDLY" => Ok(Frequency::Secondly),
            _ => Err(ValueError::InvalidRule(format!("FREQ={s}"))),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Yearly => write!(f, "YEARLY"),
            Frequency::Monthly => write!(f, "MONTHLY"),
            Frequency::Weekly => write!(f, "WEEKLY"),
            Frequency::Daily => write!(f, "DAILY"),
            Frequency::Hourly => write!(f, "HOURLY"),
            Frequency::Minutely => write!(f, "MINUTELY"),
            Frequency::Secondly => write!(f, "SECONDLY"),
        }
    }
}

/// Value of an `RRULE`/`EXRULE` property.
///
/// Only the parts that the repair passes look at are typed. Everything else (`BYDAY`, `BYMONTH`,
/// `WKST`, ...) is kept verbatim and in order so that it survives a round trip untouched.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RecurrenceRule {
    /// Unit of time that recurrence happens on.
    pub frequency: Frequency,
    /// How many `frequency` between each occurrence.
    pub interval: Option<u32>,
    /// Number of occurrences.
    pub count: Option<u32>,
    /// Date after which there will be no more occurrences.
    pub until: Option<DateValue>,
    /// Remaining rule parts as `(name, value)`.
    pub parts: Vec<(String, String)>,
}

impl FromStr for RecurrenceRule {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValueError::InvalidRule(s.to_owned());

        let mut frequency = None;
        let mut rule = RecurrenceRule::default();
        for part in s.trim().split(';').filter(|part| !part.is_empty()) {
            let (name, value) = part.split_once('=').ok_or_else(invalid)?;
            match name.to_ascii_uppercase().as_str() {
                "FREQ" => frequency = Some(value.parse()?),
                "INTERVAL" => rule.interval = Some(value.parse().map_err(|_| invalid())?),
                "COUNT" => rule.count = Some(value.parse().map_err(|_| invalid())?),
                "UNTIL" => rule.until = Some(DateValue::parse(value, None)?),
                _ => rule.parts.push((name.to_ascii_uppercase(), value.to_owned())),
            }
        }

        rule.frequency = frequency.ok_or_else(invalid)?;
        Ok(rule)
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={}", self.frequency)?;
        if let Some(interval) = self.interval {
            write!(f, ";INTERVAL={interval}")?;
        }
        if let Some(count) = self.count {
            write!(f, ";COUNT={count}")?;
        }
        if let Some(until) = &self.until {
            write!(f, ";UNTIL={until}")?;
        }
        for (name, value) in &self.parts {
            write!(f, ";{name}={value}")?;
        }
        Ok(())
    }
}
