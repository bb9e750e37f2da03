use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Serialize, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid sensor name `{0}`, expected one or more of [A-Za-z0-9]")]
    InvalidName(String),
    #[error("malformed key `{key}`: {reason}")]
    MalformedKey { key: String, reason: &'static str },
    #[error("year `{0}` cannot be encoded in a two digit key (2000-2099)")]
    YearOutOfRange(i16),
    #[error("time error `{0}`")]
    Time(String),
}

impl From<jiff::Error> for KeyError {
    fn from(value: jiff::Error) -> Self {
        Self::Time(value.to_string())
    }
}
