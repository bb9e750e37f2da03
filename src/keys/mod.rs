//! Encodes sensor identity and time into sortable string keys.
//!
//! ```txt
//! testXYZ:R:1511251832   reading key, one per sensor and minute
//! testXYZ:A:151125       aggregation key, one per sensor and day
//! ```
//!
//! # Time policy
//!
//! With [`TimePolicy::Utc`] every calendar field is taken in UTC, so a key
//! parsed back always yields the same hour and day as the builder that made
//! it. [`TimePolicy::WallClock`] renders key digits from the instant's own
//! wall clock, which is how keys were written by earlier deployments: `hour`
//! and `decimal_minute` stay in UTC while the key digits follow the local
//! clock. Parsed keys are always read as UTC.

pub mod error;
pub mod key;
pub mod pattern;

use std::fmt;

use error::KeyError;
use jiff::{ToSpan, Zoned, tz::TimeZone};
use key::Key;
use pattern::KeyPattern;
use serde::{Deserialize, Serialize};

const TEN_MINUTES: i64 = 600;

/// The one rule every sensor name must pass
pub fn is_valid_sensor_name(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

pub fn validate_sensor_name(s: &str) -> Result<SensorName, KeyError> {
    SensorName::new(s)
}

/// Minute of the hour truncated to its tens digit (0-5)
pub fn decimal_minute(minute: i8) -> i8 {
    minute / 10
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SensorName(String);

impl SensorName {
    pub fn new(s: &str) -> Result<Self, KeyError> {
        match is_valid_sensor_name(s) {
            true => Ok(Self(s.to_string())),
            false => Err(KeyError::InvalidName(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SensorName {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match is_valid_sensor_name(&value) {
            true => Ok(Self(value)),
            false => Err(KeyError::InvalidName(value)),
        }
    }
}

impl From<SensorName> for String {
    fn from(value: SensorName) -> Self {
        value.0
    }
}

impl fmt::Display for SensorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePolicy {
    #[default]
    Utc,
    WallClock,
}

/// A reading key and the fields derived from it
#[derive(Clone, Debug)]
pub struct KeyBuilder {
    key: Key,
    period: Zoned,
    hour: i8,
    decimal_minute: i8,
    day_timestamp: i64,
}

impl KeyBuilder {
    fn derive(sensor: SensorName, period: Zoned, policy: TimePolicy) -> Result<Self, KeyError> {
        let utc = period.with_time_zone(TimeZone::UTC);
        let encoded = match policy {
            TimePolicy::Utc => utc.datetime(),
            TimePolicy::WallClock => period.datetime(),
        };
        let key = Key::reading(sensor, encoded)?;
        Ok(Self {
            day_timestamp: key.day_timestamp()?,
            hour: utc.hour(),
            decimal_minute: decimal_minute(utc.minute()),
            key,
            period,
        })
    }

    pub fn sensor(&self) -> &SensorName {
        self.key.sensor()
    }

    /// The instant as given, or as UTC when parsed from a key string
    pub fn period(&self) -> &Zoned {
        &self.period
    }

    /// Hour of day in UTC
    pub fn hour(&self) -> i8 {
        self.hour
    }

    pub fn decimal_minute(&self) -> i8 {
        self.decimal_minute
    }

    pub fn day_timestamp(&self) -> i64 {
        self.day_timestamp
    }

    /// Unix seconds of the start of the ten-minute bucket holding `period`
    pub fn bucket_start(&self) -> i64 {
        let second = self.period.timestamp().as_second();
        second - second.rem_euclid(TEN_MINUTES)
    }

    pub fn aggregation_key(&self) -> Key {
        self.key.to_aggregation()
    }

    pub fn build_reading_string(&self) -> String {
        self.key.to_string()
    }

    pub fn build_aggregation_string(&self) -> String {
        self.aggregation_key().to_string()
    }

    /// `^<sensor>:R:YYMMDDHH`
    pub fn build_regex(&self) -> KeyPattern {
        KeyPattern::same_hour(&self.key)
    }

    /// `^<sensor>:R:`
    pub fn build_regex_all_readings(&self) -> KeyPattern {
        KeyPattern::all_readings(self.sensor())
    }

    /// `^<sensor>:A:`
    pub fn build_regex_all_aggregations(&self) -> KeyPattern {
        KeyPattern::all_aggregations(self.sensor())
    }
}

/// Creates [`KeyBuilder`]s. Holds nothing but the time policy.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyBuilderFactory {
    policy: TimePolicy,
}

impl KeyBuilderFactory {
    pub fn new(policy: TimePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> TimePolicy {
        self.policy
    }

    pub fn from_name_and_date(&self, sensor: &str, date: &Zoned) -> Result<KeyBuilder, KeyError> {
        KeyBuilder::derive(SensorName::new(sensor)?, date.clone(), self.policy)
    }

    pub fn from_key_string(&self, key: &str) -> Result<KeyBuilder, KeyError> {
        let key: Key = key.parse()?;
        let period = key.at().to_zoned(TimeZone::UTC)?;
        KeyBuilder::derive(key.sensor().clone(), period, self.policy)
    }

    /// One hour of elapsed time later, rolling over day, month and year
    pub fn increase_hour(&self, builder: &KeyBuilder) -> Result<KeyBuilder, KeyError> {
        let period = builder.period.checked_add(1.hour())?;
        KeyBuilder::derive(builder.sensor().clone(), period, self.policy)
    }
}
