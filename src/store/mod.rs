//! Document store capability the time series engine runs on.
//!
//! Every document is a JSON object with a string `key`, unique within its
//! collection. Two stores ship with the crate:
//!  - [`sqlite::SqliteStore`] keeps documents as JSON text in SQLite
//!  - [`memory::MemoryStore`] keeps them in an ordered map

pub mod error;
pub mod memory;
pub mod pipeline;
pub mod query;
pub mod sqlite;

use std::future::Future;

use error::StoreError;
use pipeline::Stage;
use query::{Filter, Sort};
use serde_json::Value;

pub type Document = Value;

pub const KEY_FIELD: &str = "key";

pub trait DocumentStore: Send + Sync {
    /// Fails with [`StoreError::DuplicateKey`] when the key is taken
    fn insert(
        &self,
        collection: &str,
        doc: Document,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Replaces the document with the same key, or creates it
    fn upsert(
        &self,
        collection: &str,
        doc: Document,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        sort: &[Sort],
        limit: Option<usize>,
    ) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send;

    fn aggregate(
        &self,
        collection: &str,
        stages: &[Stage],
    ) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send;

    /// Returns the number of documents removed
    fn delete_all(&self, collection: &str) -> impl Future<Output = Result<usize, StoreError>> + Send;

    fn close(self) -> impl Future<Output = Result<(), StoreError>> + Send
    where
        Self: Sized;
}

pub fn document_key(doc: &Document) -> Result<String, StoreError> {
    match doc.get(KEY_FIELD) {
        Some(Value::String(key)) => Ok(key.clone()),
        _ => Err(StoreError::MissingKey),
    }
}

/// Match, sort and limit as one pipeline
pub(crate) fn find_stages(filter: &Filter, sort: &[Sort], limit: Option<usize>) -> Vec<Stage> {
    let mut stages = vec![Stage::Match(filter.clone()), Stage::Sort(sort.to_vec())];
    if let Some(limit) = limit {
        stages.push(Stage::Limit(limit));
    }
    stages
}

/// Key prefix the leading match stage of a pipeline pins, if any
pub(crate) fn pipeline_key_prefix(stages: &[Stage]) -> Option<String> {
    match stages.first() {
        Some(Stage::Match(filter)) => filter.key_prefix(),
        _ => None,
    }
}
