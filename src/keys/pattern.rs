use std::fmt;

use super::{
    SensorName,
    key::{AGGREGATION_TAG, Key, READING_TAG, SEPARATOR},
};

/// An anchored key pattern. Displays as the regular expression `^<prefix>`.
///
/// Prefixes only ever contain `[A-Za-z0-9:]`, so the displayed pattern needs
/// no escaping and stores can answer it with a key range scan.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyPattern {
    prefix: String,
}

impl KeyPattern {
    /// Every reading key of `sensor`
    pub fn all_readings(sensor: &SensorName) -> Self {
        Self {
            prefix: format!("{sensor}{SEPARATOR}{READING_TAG}{SEPARATOR}"),
        }
    }

    /// Every aggregation key of `sensor`
    pub fn all_aggregations(sensor: &SensorName) -> Self {
        Self {
            prefix: format!("{sensor}{SEPARATOR}{AGGREGATION_TAG}{SEPARATOR}"),
        }
    }

    /// Every reading key sharing the sensor and calendar hour of `key`.
    /// Day keys match the readings of their first hour.
    pub fn same_hour(key: &Key) -> Self {
        let mut prefix = Key::Reading(key.sensor().clone(), key.at()).to_string();
        // drop the minute digits
        prefix.truncate(prefix.len() - 2);
        Self { prefix }
    }

    pub fn is_match(&self, key: &str) -> bool {
        key.starts_with(&self.prefix)
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "^{}", self.prefix)
    }
}
