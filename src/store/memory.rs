use std::collections::{BTreeMap, HashMap};

use tokio::sync::Mutex;

use super::{
    Document, DocumentStore, document_key, find_stages,
    error::StoreError,
    pipeline::{self, Stage},
    pipeline_key_prefix,
    query::{Filter, Sort, prefix_upper_bound},
};

/// collection -> key -> document
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, BTreeMap<String, Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents of `collection` in key order, narrowed to `prefix` when given
    async fn candidates(&self, collection: &str, prefix: Option<String>) -> Vec<Document> {
        let collections = self.collections.lock().await;
        let Some(docs) = collections.get(collection) else {
            return Vec::new();
        };
        match prefix {
            Some(prefix) => match prefix_upper_bound(&prefix) {
                Some(upper) => docs.range(prefix..upper).map(|(_, d)| d.clone()).collect(),
                None => docs.range(prefix..).map(|(_, d)| d.clone()).collect(),
            },
            None => docs.values().cloned().collect(),
        }
    }
}

impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, doc: Document) -> Result<(), StoreError> {
        let key = document_key(&doc)?;
        let mut collections = self.collections.lock().await;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.contains_key(&key) {
            return Err(StoreError::DuplicateKey(key));
        }
        docs.insert(key, doc);
        Ok(())
    }

    async fn upsert(&self, collection: &str, doc: Document) -> Result<(), StoreError> {
        let key = document_key(&doc)?;
        let mut collections = self.collections.lock().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(key, doc);
        Ok(())
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        sort: &[Sort],
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError> {
        let docs = self.candidates(collection, filter.key_prefix()).await;
        Ok(pipeline::execute(docs, &find_stages(filter, sort, limit)))
    }

    async fn aggregate(&self, collection: &str, stages: &[Stage]) -> Result<Vec<Document>, StoreError> {
        let docs = self.candidates(collection, pipeline_key_prefix(stages)).await;
        Ok(pipeline::execute(docs, stages))
    }

    async fn delete_all(&self, collection: &str) -> Result<usize, StoreError> {
        let mut collections = self.collections.lock().await;
        Ok(collections.remove(collection).map(|docs| docs.len()).unwrap_or(0))
    }

    async fn close(self) -> Result<(), StoreError> {
        Ok(())
    }
}
