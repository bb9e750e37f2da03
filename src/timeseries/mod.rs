//! Time series engine: writes readings, rebuilds per-day rollups and reads
//! them back at ten-minute or hourly granularity.

pub mod error;
pub mod model;
pub mod rollup;

use std::{collections::HashMap, sync::Arc};

use error::TimeSeriesError;
use jiff::{Timestamp, Zoned};
use model::{Bucket, DayAggregate, Reading, Selection};
use rollup::{HourRow, TenMinuteRow, fold_days, hour_pipeline, ten_minute_pipeline, ten_minute_select_pipeline};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{Level, debug, info, instrument, span};

use crate::{
    config::TimeSeriesConfig,
    keys::{KeyBuilderFactory, SensorName, pattern::KeyPattern},
    store::{
        Document, DocumentStore, KEY_FIELD,
        query::{Filter, Sort},
        sqlite::SqliteStore,
    },
};

pub struct TimeSeries<S> {
    store: S,
    collection: String,
    keys: KeyBuilderFactory,
    /// sensor -> held while its day documents are rebuilt. Entries only live
    /// while an aggregation of that sensor runs or waits.
    aggregation_locks: Mutex<HashMap<SensorName, Arc<Mutex<()>>>>,
}

impl TimeSeries<SqliteStore> {
    pub async fn connect(cfg: &TimeSeriesConfig) -> Result<Self, TimeSeriesError> {
        let store = SqliteStore::open(&cfg.connection_string).await?;
        Ok(Self::new(store, &cfg.collection, KeyBuilderFactory::new(cfg.time_policy)))
    }
}

impl<S: DocumentStore> TimeSeries<S> {
    pub fn new(store: S, collection: &str, keys: KeyBuilderFactory) -> Self {
        let span = span!(Level::INFO, "TimeSeries", collection);
        let _enter = span.enter();
        info!("initializing with {:?} time policy", keys.policy());

        Self {
            store,
            collection: collection.to_string(),
            keys,
            aggregation_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Writes one reading and returns its key. A second reading in the same
    /// minute replaces the first. NaN and infinities are refused, JSON has no
    /// encoding for them.
    #[instrument(skip(self))]
    pub async fn store_reading(&self, sensor: &str, value: f64, at: &Zoned) -> Result<String, TimeSeriesError> {
        if !value.is_finite() {
            return Err(TimeSeriesError::NonFiniteValue(value));
        }
        let builder = self.keys.from_name_and_date(sensor, at)?;
        let reading = Reading::new(&builder, value);
        let key = reading.key.clone();
        self.store
            .upsert(&self.collection, serde_json::to_value(reading)?)
            .await?;
        debug!(%key, "stored reading");
        Ok(key)
    }

    #[instrument(skip(self))]
    pub async fn select_last_sample(&self, sensor: &str) -> Result<Selection<Reading>, TimeSeriesError> {
        let sensor = SensorName::new(sensor)?;
        let filter = Filter::key_pattern(&KeyPattern::all_readings(&sensor))?;
        let docs = self
            .store
            .find(&self.collection, &filter, &[Sort::desc(KEY_FIELD)], Some(1))
            .await?;
        Ok(Selection {
            sensor,
            data: parse_all(docs)?,
        })
    }

    /// Rebuilds every day document of `sensor` from its raw readings and
    /// returns how many were written
    #[instrument(skip(self))]
    pub async fn aggregate_sensor(&self, sensor: &str) -> Result<usize, TimeSeriesError> {
        let sensor = SensorName::new(sensor)?;
        let lock = self
            .aggregation_locks
            .lock()
            .await
            .entry(sensor.clone())
            .or_default()
            .clone();
        let res = {
            let _guard = lock.lock().await;
            self.rebuild_days(&sensor).await
        };

        let mut locks = self.aggregation_locks.lock().await;
        // ours and the map's
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&sensor);
        }
        drop(lock);
        res
    }

    async fn rebuild_days(&self, sensor: &SensorName) -> Result<usize, TimeSeriesError> {
        let readings = Filter::key_pattern(&KeyPattern::all_readings(sensor))?;
        let rows = self
            .store
            .aggregate(&self.collection, &ten_minute_pipeline(readings))
            .await?;
        let days = fold_days(sensor, parse_all::<TenMinuteRow>(rows)?)?;

        for day in &days {
            self.store
                .upsert(&self.collection, serde_json::to_value(day)?)
                .await?;
        }
        info!(days = days.len(), "aggregated");
        Ok(days.len())
    }

    /// Ten-minute buckets with `bucketStart` in `[from, to]`
    #[instrument(skip(self))]
    pub async fn select_aggregation_by_10min(
        &self,
        sensor: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Selection<Bucket>, TimeSeriesError> {
        let sensor = SensorName::new(sensor)?;
        let days = Filter::key_pattern(&KeyPattern::all_aggregations(&sensor))?;
        let docs = self
            .store
            .aggregate(
                &self.collection,
                &ten_minute_select_pipeline(days, from.as_second(), to.as_second()),
            )
            .await?;

        let data = docs
            .into_iter()
            .map(|mut doc| serde_json::from_value(doc["buckets"].take()))
            .collect::<Result<_, _>>()?;
        Ok(Selection { sensor, data })
    }

    /// Hourly buckets with `hourStart` in `[from, to]`
    #[instrument(skip(self))]
    pub async fn select_aggregation_by_hour(
        &self,
        sensor: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Selection<Bucket>, TimeSeriesError> {
        let sensor = SensorName::new(sensor)?;
        let days = Filter::key_pattern(&KeyPattern::all_aggregations(&sensor))?;
        let rows = self
            .store
            .aggregate(&self.collection, &hour_pipeline(days, from.as_second(), to.as_second()))
            .await?;

        let data = parse_all::<HourRow>(rows)?.into_iter().map(Bucket::from).collect();
        Ok(Selection { sensor, data })
    }

    /// Day documents of `sensor` in key order
    pub async fn day_aggregates(&self, sensor: &str) -> Result<Vec<DayAggregate>, TimeSeriesError> {
        let sensor = SensorName::new(sensor)?;
        let filter = Filter::key_pattern(&KeyPattern::all_aggregations(&sensor))?;
        let docs = self
            .store
            .find(&self.collection, &filter, &[Sort::asc(KEY_FIELD)], None)
            .await?;
        parse_all(docs)
    }

    /// Drops every document of the collection
    pub async fn reset(&self) -> Result<usize, TimeSeriesError> {
        let removed = self.store.delete_all(&self.collection).await?;
        info!(removed, collection = %self.collection, "reset");
        Ok(removed)
    }

    pub async fn close(self) -> Result<(), TimeSeriesError> {
        Ok(self.store.close().await?)
    }
}

fn parse_all<T: DeserializeOwned>(docs: Vec<Document>) -> Result<Vec<T>, TimeSeriesError> {
    Ok(docs
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<_, _>>()?)
}

#[cfg(test)]
mod test {
    use jiff::{ToSpan, tz::TimeZone};

    use super::*;
    use crate::{
        keys::{TimePolicy, error::KeyError},
        store::{memory::MemoryStore, sqlite::IN_MEMORY},
    };

    fn engine(policy: TimePolicy) -> TimeSeries<MemoryStore> {
        TimeSeries::new(MemoryStore::new(), "test", KeyBuilderFactory::new(policy))
    }

    fn utc(s: &str) -> Zoned {
        s.parse::<Timestamp>().unwrap().to_zoned(TimeZone::UTC)
    }

    /// One reading per minute, cycling 10, 15, 20
    async fn fill<S: DocumentStore>(ts: &TimeSeries<S>, sensor: &str, start: &Zoned, minutes: i64) {
        for i in 0..minutes {
            let at = start.checked_add(i.minutes()).unwrap();
            let value = [10., 15., 20.][(i % 3) as usize];
            ts.store_reading(sensor, value, &at).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_store_reading_key() {
        let ts = engine(TimePolicy::Utc);
        let at = utc("2017-12-05T15:24:42Z");
        assert_eq!(ts.store_reading("test0001", 1.5, &at).await.unwrap(), "test0001:R:1712051524");

        let ts = engine(TimePolicy::WallClock);
        let at = "2017-12-05T15:24:42Z"
            .parse::<Timestamp>()
            .unwrap()
            .to_zoned(TimeZone::fixed(jiff::tz::offset(1)));
        assert_eq!(ts.store_reading("test0001", 1.5, &at).await.unwrap(), "test0001:R:1712051624");
    }

    #[tokio::test]
    async fn test_select_last_sample() {
        let ts = engine(TimePolicy::Utc);
        ts.store_reading("s1", 1., &utc("2016-01-01T10:00:00Z")).await.unwrap();
        ts.store_reading("s1", 2., &utc("2016-01-01T10:01:00Z")).await.unwrap();
        ts.store_reading("s2", 3., &utc("2016-01-01T11:00:00Z")).await.unwrap();

        let last = ts.select_last_sample("s1").await.unwrap();
        assert_eq!(last.sensor.as_str(), "s1");
        assert_eq!(last.data.len(), 1);
        assert_eq!(last.data[0].key, "s1:R:1601011001");
        assert_eq!(last.data[0].value, 2.);

        assert!(ts.select_last_sample("nothing").await.unwrap().data.is_empty());
    }

    #[tokio::test]
    async fn test_same_minute_overwrites() {
        let ts = engine(TimePolicy::Utc);
        ts.store_reading("s1", 1., &utc("2016-01-01T10:00:05Z")).await.unwrap();
        ts.store_reading("s1", 4., &utc("2016-01-01T10:00:55Z")).await.unwrap();

        let last = ts.select_last_sample("s1").await.unwrap();
        assert_eq!(last.data[0].value, 4.);
        assert_eq!(last.data[0].period, "2016-01-01T10:00:55Z".parse::<Timestamp>().unwrap());
        assert_eq!(ts.reset().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_sensor() {
        let ts = engine(TimePolicy::Utc);
        let res = ts.store_reading("test&123", 1., &utc("2016-01-01T10:00:00Z")).await;
        assert!(matches!(
            res,
            Err(TimeSeriesError::KeyError(KeyError::InvalidName(name))) if name == "test&123"
        ));
        assert!(ts.aggregate_sensor("").await.is_err());
    }

    #[tokio::test]
    async fn test_two_day_rollup() {
        let ts = engine(TimePolicy::Utc);
        fill(&ts, "testXYZ", &utc("2016-01-01T00:00:00Z"), 2 * 24 * 60).await;
        assert_eq!(ts.aggregate_sensor("testXYZ").await.unwrap(), 2);

        // starts inside a bucket and crosses midnight into the second day
        let (from, to) = (
            "2016-01-01T22:32:00Z".parse().unwrap(),
            "2016-01-02T01:11:00Z".parse().unwrap(),
        );
        let ten = ts.select_aggregation_by_10min("testXYZ", from, to).await.unwrap();
        assert_eq!(ten.data.len(), 16);
        for bucket in &ten.data {
            assert_eq!((bucket.min, bucket.max, bucket.value, bucket.samples), (10., 20., 15., 10));
        }
        assert!(ten.data.windows(2).all(|w| w[1].bucket_start - w[0].bucket_start == 600));
        // 22:40 and 01:10
        assert_eq!(ten.data[0].bucket_start, 1451688000);
        assert_eq!(ten.data[15].bucket_start, 1451697000);

        let hours = ts.select_aggregation_by_hour("testXYZ", from, to).await.unwrap();
        let starts: Vec<_> = hours.data.iter().map(|b| b.hour_start).collect();
        assert_eq!(starts, vec![1451689200, 1451692800, 1451696400]);
        for bucket in &hours.data {
            assert_eq!((bucket.min, bucket.max, bucket.value, bucket.samples), (10., 20., 15., 60));
        }

        let days = ts.day_aggregates("testXYZ").await.unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[1].key, "testXYZ:A:160102");
        assert_eq!(days[1].day_timestamp, 1451692800);
        assert_eq!(days[1].buckets.len(), 144);
    }

    #[tokio::test]
    async fn test_wall_clock_repeated_hour() {
        let ts = engine(TimePolicy::WallClock);
        let local = |s: &str, offset: i8| {
            s.parse::<Timestamp>()
                .unwrap()
                .to_zoned(TimeZone::fixed(jiff::tz::offset(offset)))
        };
        // 00:05 EDT and 23:05 EST on the 25 hour day of 2015-11-01, both 04:05 UTC
        let first = ts.store_reading("s1", 1., &local("2015-11-01T04:05:00Z", -4)).await.unwrap();
        let second = ts.store_reading("s1", 9., &local("2015-11-02T04:05:00Z", -5)).await.unwrap();
        assert_eq!((first.as_str(), second.as_str()), ("s1:R:1511010005", "s1:R:1511012305"));

        assert_eq!(ts.aggregate_sensor("s1").await.unwrap(), 1);
        let days = ts.day_aggregates("s1").await.unwrap();
        assert_eq!(days[0].key, "s1:A:151101");
        assert_eq!(days[0].day_timestamp, 1446336000);
        assert_eq!(
            days[0].buckets,
            vec![Bucket::new(1446350400, 1., 1., 1), Bucket::new(1446436800, 9., 9., 1)]
        );
    }

    #[tokio::test]
    async fn test_non_finite_values() {
        let ts = engine(TimePolicy::Utc);
        let at = utc("2016-01-01T10:00:00Z");
        ts.store_reading("s1", 3., &at).await.unwrap();

        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let res = ts.store_reading("s1", value, &at).await;
            assert!(matches!(res, Err(TimeSeriesError::NonFiniteValue(_))));
        }

        let last = ts.select_last_sample("s1").await.unwrap();
        assert_eq!(last.data[0].value, 3.);
        assert_eq!(ts.aggregate_sensor("s1").await.unwrap(), 1);
        assert_eq!(ts.day_aggregates("s1").await.unwrap()[0].buckets[0].max, 3.);
    }

    #[tokio::test]
    async fn test_aggregation_is_idempotent() {
        let ts = engine(TimePolicy::Utc);
        fill(&ts, "s1", &utc("2016-02-28T23:30:00Z"), 90).await;

        assert_eq!(ts.aggregate_sensor("s1").await.unwrap(), 2);
        let first = serde_json::to_string(&ts.day_aggregates("s1").await.unwrap()).unwrap();
        assert_eq!(ts.aggregate_sensor("s1").await.unwrap(), 2);
        let second = serde_json::to_string(&ts.day_aggregates("s1").await.unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_concurrent_aggregation() {
        let ts = engine(TimePolicy::Utc);
        fill(&ts, "s1", &utc("2016-01-01T00:00:00Z"), 30).await;
        fill(&ts, "s2", &utc("2016-01-01T00:00:00Z"), 30).await;

        let (a, b, c) = tokio::join!(
            ts.aggregate_sensor("s1"),
            ts.aggregate_sensor("s1"),
            ts.aggregate_sensor("s2")
        );
        assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (1, 1, 1));
        assert_eq!(ts.day_aggregates("s1").await.unwrap()[0].buckets.len(), 3);
        assert!(ts.aggregation_locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_sensor() {
        let ts = engine(TimePolicy::Utc);
        assert_eq!(ts.aggregate_sensor("s1").await.unwrap(), 0);
        let from = "2016-01-01T00:00:00Z".parse().unwrap();
        let hours = ts.select_aggregation_by_hour("s1", from, from).await.unwrap();
        assert!(hours.data.is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_rollup() {
        let store = SqliteStore::open(IN_MEMORY).await.unwrap();
        let ts = TimeSeries::new(store, "test", KeyBuilderFactory::default());
        let start = utc("2016-01-01T22:00:00Z");
        fill(&ts, "s1", &start, 120).await;
        fill(&ts, "s2", &start, 10).await;

        assert_eq!(ts.aggregate_sensor("s1").await.unwrap(), 1);
        let (from, to) = (start.timestamp(), "2016-01-01T23:59:00Z".parse().unwrap());
        let hours = ts.select_aggregation_by_hour("s1", from, to).await.unwrap();
        assert_eq!(hours.data.len(), 2);
        assert_eq!(hours.data[1].samples, 60);

        let last = ts.select_last_sample("s1").await.unwrap();
        assert_eq!(last.data[0].key, "s1:R:1601012359");
        // 130 readings and one day document
        assert_eq!(ts.reset().await.unwrap(), 131);
        ts.close().await.unwrap();
    }
}
