use jiff::{Zoned, tz::TimeZone};
use serde_json::json;

use crate::{store::DocumentStore, timeseries::TimeSeries};

use super::{
    error::DispatchError,
    model::{Cli, CliCommands},
};

impl Cli {
    /// Runs the command and returns its JSON output, if any
    pub async fn dispatch<S: DocumentStore>(self, ts: &TimeSeries<S>) -> Result<Option<String>, DispatchError> {
        Ok(match self.command {
            CliCommands::Store(args) => {
                let at = match args.at {
                    Some(at) => at.to_zoned(TimeZone::system()),
                    None => Zoned::now(),
                };
                let key = ts.store_reading(&args.sensor, args.value, &at).await?;
                Some(serde_json::to_string(&json!({ "key": key }))?)
            }
            CliCommands::Last(args) => {
                let res = ts.select_last_sample(&args.sensor).await?;
                Some(serde_json::to_string(&res)?)
            }
            CliCommands::Aggregate(args) => {
                let days = ts.aggregate_sensor(&args.sensor).await?;
                Some(serde_json::to_string(&json!({ "days": days }))?)
            }
            CliCommands::TenMinutes(args) => {
                let res = ts
                    .select_aggregation_by_10min(&args.sensor, args.from, args.to)
                    .await?;
                Some(serde_json::to_string(&res)?)
            }
            CliCommands::Hours(args) => {
                let res = ts
                    .select_aggregation_by_hour(&args.sensor, args.from, args.to)
                    .await?;
                Some(serde_json::to_string(&res)?)
            }
            CliCommands::Reset => {
                ts.reset().await?;
                None
            }
        })
    }
}
