use tokio_rusqlite::Connection;
use tracing::debug;

use super::{
    Document, DocumentStore, KEY_FIELD, document_key, find_stages,
    error::StoreError,
    pipeline::{self, Stage},
    pipeline_key_prefix,
    query::{Filter, Sort, prefix_upper_bound},
};

pub const IN_MEMORY: &str = ":memory:";

/// Documents live as JSON text in one table. Anchored key patterns become
/// a range scan over the primary key, everything else runs in-process.
pub struct SqliteStore(Connection);

impl SqliteStore {
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let conn = match path {
            IN_MEMORY => Connection::open_in_memory().await?,
            path => Connection::open(path).await?,
        };
        conn.call(|conn| {
            Ok(conn.execute(
                "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                key        TEXT NOT NULL,
                body       TEXT NOT NULL,
                PRIMARY KEY (collection, key)
            )",
                (),
            )?)
        })
        .await?;
        debug!(path, "opened document store");
        Ok(Self(conn))
    }

    /// Documents of `collection` in key order, narrowed to `prefix` when given
    async fn candidates(
        &self,
        collection: &str,
        prefix: Option<String>,
        descending: bool,
    ) -> Result<Vec<Document>, StoreError> {
        let mut sql = "SELECT body FROM documents WHERE collection = ?1".to_string();
        let mut params = vec![collection.to_string()];
        if let Some(prefix) = prefix {
            sql.push_str(" AND key >= ?2");
            let upper = prefix_upper_bound(&prefix);
            params.push(prefix);
            if let Some(upper) = upper {
                sql.push_str(" AND key < ?3");
                params.push(upper);
            }
        }
        sql.push_str(match descending {
            true => " ORDER BY key DESC",
            false => " ORDER BY key ASC",
        });

        let bodies = self
            .0
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let bodies = stmt
                    .query_map(rusqlite::params_from_iter(params), |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(bodies)
            })
            .await?;

        Ok(bodies
            .iter()
            .map(|body| serde_json::from_str::<Document>(body))
            .collect::<Result<_, _>>()?)
    }
}

impl DocumentStore for SqliteStore {
    async fn insert(&self, collection: &str, doc: Document) -> Result<(), StoreError> {
        let key = document_key(&doc)?;
        let (collection, key_copy, body) = (collection.to_string(), key.clone(), serde_json::to_string(&doc)?);
        let res = self
            .0
            .call(move |conn| {
                Ok(conn.execute(
                    "INSERT INTO documents (collection, key, body) VALUES (?1, ?2, ?3)",
                    (collection, key_copy, body),
                )?)
            })
            .await;

        match res {
            Ok(_) => Ok(()),
            Err(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _)))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::DuplicateKey(key))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn upsert(&self, collection: &str, doc: Document) -> Result<(), StoreError> {
        let key = document_key(&doc)?;
        let (collection, body) = (collection.to_string(), serde_json::to_string(&doc)?);
        self.0
            .call(move |conn| {
                Ok(conn.execute(
                    "INSERT INTO documents (collection, key, body) VALUES (?1, ?2, ?3)
                    ON CONFLICT (collection, key) DO UPDATE SET body = excluded.body",
                    (collection, key, body),
                )?)
            })
            .await?;
        Ok(())
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        sort: &[Sort],
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError> {
        let descending = sort
            .first()
            .is_some_and(|s| s.field == KEY_FIELD && !s.ascending);
        let docs = self
            .candidates(collection, filter.key_prefix(), descending)
            .await?;
        Ok(pipeline::execute(docs, &find_stages(filter, sort, limit)))
    }

    async fn aggregate(&self, collection: &str, stages: &[Stage]) -> Result<Vec<Document>, StoreError> {
        let docs = self
            .candidates(collection, pipeline_key_prefix(stages), false)
            .await?;
        Ok(pipeline::execute(docs, stages))
    }

    async fn delete_all(&self, collection: &str) -> Result<usize, StoreError> {
        let collection = collection.to_string();
        Ok(self
            .0
            .call(move |conn| {
                Ok(conn.execute("DELETE FROM documents WHERE collection = ?1", [collection])?)
            })
            .await?)
    }

    async fn close(self) -> Result<(), StoreError> {
        Ok(self.0.close().await?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::test::check_contract;

    #[tokio::test]
    async fn test_contract() {
        check_contract(SqliteStore::open(IN_MEMORY).await.unwrap()).await;
    }

    #[tokio::test]
    async fn test_collections_are_separate() {
        let store = SqliteStore::open(IN_MEMORY).await.unwrap();
        let doc = serde_json::json!({ "key": "a:R:1601010000", "value": 1.0 });
        store.insert("one", doc.clone()).await.unwrap();
        store.insert("two", doc).await.unwrap();

        assert_eq!(store.delete_all("one").await.unwrap(), 1);
        let rest = store.find("two", &Filter::And(vec![]), &[], None).await.unwrap();
        assert_eq!(rest.len(), 1);
        store.close().await.unwrap();
    }
}
