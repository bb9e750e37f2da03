use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::keys::{KeyBuilder, SensorName};

pub const HOUR: i64 = 3600;

/// One sample of one sensor, at most one per minute
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub sensor: SensorName,
    pub key: String,
    pub value: f64,
    pub period: Timestamp,
    /// aggregation key of the day this reading rolls up into
    pub aggregate: String,
    /// UTC
    pub hour: i8,
    pub decimal_minute: i8,
    pub bucket_start: i64,
}

impl Reading {
    pub fn new(builder: &KeyBuilder, value: f64) -> Self {
        Self {
            sensor: builder.sensor().clone(),
            key: builder.build_reading_string(),
            value,
            period: builder.period().timestamp(),
            aggregate: builder.build_aggregation_string(),
            hour: builder.hour(),
            decimal_minute: builder.decimal_minute(),
            bucket_start: builder.bucket_start(),
        }
    }
}

/// Statistics of the readings in a ten-minute or one-hour bucket
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    /// Unix seconds
    pub bucket_start: i64,
    pub hour_start: i64,
    pub min: f64,
    pub max: f64,
    /// midpoint of min and max
    pub value: f64,
    pub samples: u64,
}

impl Bucket {
    pub fn new(bucket_start: i64, min: f64, max: f64, samples: u64) -> Self {
        Self {
            bucket_start,
            hour_start: bucket_start - bucket_start.rem_euclid(HOUR),
            min,
            max,
            value: midpoint(min, max),
            samples,
        }
    }
}

pub fn midpoint(min: f64, max: f64) -> f64 {
    (min + max) / 2.
}

/// Every ten-minute bucket of one sensor and day
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAggregate {
    pub sensor: SensorName,
    pub key: String,
    pub day_timestamp: i64,
    pub buckets: Vec<Bucket>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Selection<T> {
    pub sensor: SensorName,
    pub data: Vec<T>,
}
