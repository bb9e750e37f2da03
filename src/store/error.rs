use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error `{0}`")]
    SQLiteError(tokio_rusqlite::Error),
    #[error("json error `{0}`")]
    JsonError(serde_json::Error),
    #[error("document has no string `key` field")]
    MissingKey,
    #[error("duplicate key `{0}`")]
    DuplicateKey(String),
    #[error("bad pattern `{0}`")]
    BadPattern(String),
}

impl From<tokio_rusqlite::Error> for StoreError {
    fn from(value: tokio_rusqlite::Error) -> Self {
        Self::SQLiteError(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::JsonError(value)
    }
}

impl From<regex::Error> for StoreError {
    fn from(value: regex::Error) -> Self {
        Self::BadPattern(value.to_string())
    }
}
