use clap::{Args, Parser, Subcommand};
use jiff::Timestamp;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// RON config file, overridden by SENSORTS_* variables
    #[arg(long, global = true)]
    pub config: Option<String>,
    #[command(subcommand)]
    pub command: CliCommands,
}

impl Cli {
    /// Parses one command line without the program name
    pub fn from_line(cmd_str: &str) -> Result<Self, clap::error::Error> {
        let cmd_str = "sensorts ".to_string() + cmd_str;
        let res = Self::try_parse_from(cmd_str.split_whitespace())?;
        Ok(res)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommands {
    /// Store one reading
    Store(StoreArgs),
    /// Show the latest reading of a sensor
    Last(SensorArgs),
    /// Rebuild the day aggregates of a sensor
    #[command(alias = "agg")]
    Aggregate(SensorArgs),
    /// Ten-minute buckets in a time range
    #[command(alias = "10m")]
    TenMinutes(RangeArgs),
    /// Hourly buckets in a time range
    Hours(RangeArgs),
    /// Delete every document of the collection
    Reset,
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    pub sensor: String,
    #[arg(allow_negative_numbers = true)]
    pub value: f64,
    /// RFC 3339 instant, defaults to now
    #[arg(long)]
    pub at: Option<Timestamp>,
}

#[derive(Args, Debug, Clone)]
pub struct SensorArgs {
    pub sensor: String,
}

#[derive(Args, Debug, Clone)]
pub struct RangeArgs {
    pub sensor: String,
    /// RFC 3339, inclusive
    pub from: Timestamp,
    /// RFC 3339, inclusive
    pub to: Timestamp,
}
