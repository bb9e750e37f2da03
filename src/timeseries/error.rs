use thiserror::Error;

use crate::{keys::error::KeyError, store::error::StoreError};

#[derive(Error, Debug)]
pub enum TimeSeriesError {
    #[error("key error `{0}`")]
    KeyError(KeyError),
    #[error("store error `{0}`")]
    StoreError(StoreError),
    #[error("bad document `{0}`")]
    BadDocument(serde_json::Error),
    #[error("reading value `{0}` is not a finite number")]
    NonFiniteValue(f64),
}

impl From<KeyError> for TimeSeriesError {
    fn from(value: KeyError) -> Self {
        Self::KeyError(value)
    }
}

impl From<StoreError> for TimeSeriesError {
    fn from(value: StoreError) -> Self {
        Self::StoreError(value)
    }
}

impl From<serde_json::Error> for TimeSeriesError {
    fn from(value: serde_json::Error) -> Self {
        Self::BadDocument(value)
    }
}
