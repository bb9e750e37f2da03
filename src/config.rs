use std::{error::Error, fs};

use config::{Config, Environment};
use ron::{Options, extensions::Extensions};
use serde::{Deserialize, Serialize};

use crate::keys::TimePolicy;

pub const ENV_PREFIX: &str = "SENSORTS";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeSeriesConfig {
    /// SQLite path, or `:memory:`
    pub connection_string: String,
    pub collection: String,
    pub time_policy: TimePolicy,
}

impl Default for TimeSeriesConfig {
    fn default() -> Self {
        Self {
            connection_string: "sensorts.sqlite".to_string(),
            collection: "timeseries".to_string(),
            time_policy: TimePolicy::default(),
        }
    }
}

impl TimeSeriesConfig {
    /// Reads `file_path` when given, then applies `SENSORTS_*` overrides
    pub fn load(file_path: Option<&str>) -> Result<Self, Box<dyn Error>> {
        let base = match file_path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.with_env(Environment::with_prefix(ENV_PREFIX))
    }

    pub fn from_file(file_path: &str) -> Result<Self, Box<dyn Error>> {
        Self::parse(&fs::read_to_string(file_path)?)
    }

    pub fn parse(s: &str) -> Result<Self, Box<dyn Error>> {
        let options = Options::default()
            .with_default_extension(Extensions::IMPLICIT_SOME)
            .with_default_extension(Extensions::UNWRAP_NEWTYPES);
        Ok(options.from_str(s)?)
    }

    fn with_env(self, env: Environment) -> Result<Self, Box<dyn Error>> {
        Ok(Config::builder()
            .add_source(Config::try_from(&self)?)
            .add_source(env)
            .build()?
            .try_deserialize()?)
    }
}
