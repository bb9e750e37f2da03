//! Rollup pipelines.
//!
//! ```txt
//! readings  --group (day, bucketStart)----------->  ten-minute buckets
//! buckets   --fold by day------------------------>  one DayAggregate per day
//! buckets   --group hourStart-------------------->  hourly buckets
//! ```

use serde::Deserialize;

use crate::store::{
    pipeline::{Accumulator, Group, Stage},
    query::{Filter, Sort},
};

use super::{
    error::TimeSeriesError,
    model::{Bucket, DayAggregate},
};
use crate::keys::{SensorName, key::Key};

const BUCKETS: &str = "buckets";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TenMinuteId {
    aggregate: String,
    bucket_start: i64,
}

/// One output row of [`ten_minute_pipeline`]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenMinuteRow {
    #[serde(rename = "_id")]
    id: TenMinuteId,
    min: f64,
    max: f64,
    samples: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HourId {
    hour_start: i64,
}

/// One output row of [`hour_pipeline`]
#[derive(Debug, Deserialize)]
pub struct HourRow {
    #[serde(rename = "_id")]
    id: HourId,
    min: f64,
    max: f64,
    samples: u64,
}

/// Groups raw readings into ten-minute buckets, ordered by day then time.
///
/// Buckets are told apart by `bucketStart`, not by hour and decimal minute:
/// a wall clock day can hold the same UTC hour twice.
pub fn ten_minute_pipeline(readings: Filter) -> Vec<Stage> {
    vec![
        Stage::Match(readings),
        Stage::Group(
            Group::new()
                .id("aggregate", "aggregate")
                .id("bucketStart", "bucketStart")
                .field("min", Accumulator::Min("value".to_string()))
                .field("max", Accumulator::Max("value".to_string()))
                .field("samples", Accumulator::Count),
        ),
        Stage::Sort(vec![Sort::asc("_id.aggregate"), Sort::asc("_id.bucketStart")]),
    ]
}

/// Ten-minute buckets of every day document with `bucketStart` in `[from, to]`
pub fn ten_minute_select_pipeline(aggregations: Filter, from: i64, to: i64) -> Vec<Stage> {
    vec![
        Stage::Match(aggregations),
        Stage::Unwind(BUCKETS.to_string()),
        Stage::Match(Filter::between("buckets.bucketStart", from, to)),
        Stage::Sort(vec![Sort::asc("buckets.bucketStart")]),
    ]
}

/// Ten-minute buckets regrouped by hour, `hourStart` in `[from, to]`
pub fn hour_pipeline(aggregations: Filter, from: i64, to: i64) -> Vec<Stage> {
    vec![
        Stage::Match(aggregations),
        Stage::Unwind(BUCKETS.to_string()),
        Stage::Match(Filter::between("buckets.hourStart", from, to)),
        Stage::Group(
            Group::new()
                .id("hourStart", "buckets.hourStart")
                .field("min", Accumulator::Min("buckets.min".to_string()))
                .field("max", Accumulator::Max("buckets.max".to_string()))
                .field("samples", Accumulator::Sum("buckets.samples".to_string())),
        ),
        Stage::Sort(vec![Sort::asc("_id.hourStart")]),
    ]
}

/// Folds rows sorted by day into one document per day
pub fn fold_days(sensor: &SensorName, rows: Vec<TenMinuteRow>) -> Result<Vec<DayAggregate>, TimeSeriesError> {
    let mut days: Vec<DayAggregate> = Vec::new();
    for row in rows {
        let bucket = Bucket::new(row.id.bucket_start, row.min, row.max, row.samples);
        match days.last_mut() {
            Some(day) if day.key == row.id.aggregate => day.buckets.push(bucket),
            _ => {
                let key: Key = row.id.aggregate.parse()?;
                days.push(DayAggregate {
                    sensor: sensor.clone(),
                    day_timestamp: key.day_timestamp()?,
                    key: row.id.aggregate,
                    buckets: vec![bucket],
                });
            }
        }
    }
    Ok(days)
}

impl From<HourRow> for Bucket {
    fn from(row: HourRow) -> Self {
        Bucket::new(row.id.hour_start, row.min, row.max, row.samples)
    }
}
