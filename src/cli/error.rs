use serde::Serialize;
use thiserror::Error;

use crate::{keys::error::KeyError, timeseries::error::TimeSeriesError};

#[derive(Error, Debug, Serialize)]
pub enum DispatchError {
    #[error("key error `{0}`")]
    KeyError(KeyError),
    #[error("time series error `{0}`")]
    TimeSeriesError(String),
    #[error("json encoding error `{0}`")]
    JsonEncodingError(String),
}

impl From<serde_json::Error> for DispatchError {
    fn from(value: serde_json::Error) -> Self {
        Self::JsonEncodingError(value.to_string())
    }
}

impl From<TimeSeriesError> for DispatchError {
    fn from(value: TimeSeriesError) -> Self {
        match value {
            TimeSeriesError::KeyError(e) => Self::KeyError(e),
            e => Self::TimeSeriesError(e.to_string()),
        }
    }
}

