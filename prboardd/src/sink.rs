use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use prboard_core::{PullRequestRecord, RefreshMetadata};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::store::{Document, DocumentStore, Result, StoreError};

pub const PULL_REQUEST_COLLECTION: &str = "pullRequests";
pub const METADATA_COLLECTION: &str = "metadata";
pub const METADATA_ID: &str = "refresh";

#[derive(Clone)]
pub struct PersistenceSink {
    store: Arc<dyn DocumentStore>,
}

impl PersistenceSink {
    pub fn new(store: Arc<dyn DocumentStore>) -> PersistenceSink {
        PersistenceSink { store }
    }

    pub async fn upsert_records(&self, records: &[PullRequestRecord]) -> Vec<Result<()>> {
        join_all(records.iter().map(|record| async move {
            let fields = to_document(PULL_REQUEST_COLLECTION, &record.id, record)?;
            self.store
                .merge(PULL_REQUEST_COLLECTION, &record.id, fields)
                .await
        }))
        .await
    }

    pub async fn write_metadata(&self, last_refresh: DateTime<Utc>, count: usize) -> Result<()> {
        let metadata = RefreshMetadata {
            last_refresh,
            last_refresh_count: count,
        };
        let fields = to_document(METADATA_COLLECTION, METADATA_ID, &metadata)?;

        self.store
            .merge(METADATA_COLLECTION, METADATA_ID, fields)
            .await
    }

    pub async fn records(&self) -> Result<Vec<PullRequestRecord>> {
        self.store
            .list(PULL_REQUEST_COLLECTION)
            .await?
            .into_iter()
            .map(|(id, document)| from_document(PULL_REQUEST_COLLECTION, id, document))
            .collect()
    }

    pub async fn metadata(&self) -> Result<Option<RefreshMetadata>> {
        self.store
            .get(METADATA_COLLECTION, METADATA_ID)
            .await?
            .map(|document| from_document(METADATA_COLLECTION, METADATA_ID.to_string(), document))
            .transpose()
    }
}

fn to_document<T: Serialize>(collection: &str, id: &str, value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(document) => Ok(document),
        _ => Err(StoreError::NotAnObject {
            collection: collection.to_string(),
            id: id.to_string(),
        }),
    }
}

fn from_document<T: DeserializeOwned>(
    collection: &str,
    id: String,
    document: Document,
) -> Result<T> {
    serde_json::from_value(Value::Object(document)).map_err(|source| StoreError::Corrupt {
        collection: collection.to_string(),
        id,
        source,
    })
}
