use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    sync::RwLock,
};

use async_trait::async_trait;
use log::info;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;

pub type Document = Map<String, Value>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store file io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not serialize document: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Document {id} in {collection} is not a JSON object")]
    NotAnObject { collection: String, id: String },
    #[error("Document {id} in {collection} does not have the expected shape: {source}")]
    Corrupt {
        collection: String,
        id: String,
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn merge(&self, collection: &str, id: &str, fields: Document) -> Result<()>;
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;
    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>>;
}

type Collections = HashMap<String, BTreeMap<String, Document>>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Default::default()
    }

    fn from_collections(collections: Collections) -> Self {
        MemoryStore {
            collections: RwLock::new(collections),
        }
    }

    fn snapshot(&self) -> Collections {
        self.collections.read().unwrap().clone()
    }

    fn replace(&self, collections: Collections) {
        *self.collections.write().unwrap() = collections;
    }
}

// Incoming fields replace stored ones, fields only on the stored document are kept.
fn merge_fields(collections: &mut Collections, collection: &str, id: &str, fields: Document) {
    let document = collections
        .entry(collection.to_string())
        .or_default()
        .entry(id.to_string())
        .or_default();

    for (key, value) in fields {
        document.insert(key, value);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn merge(&self, collection: &str, id: &str, fields: Document) -> Result<()> {
        merge_fields(&mut self.collections.write().unwrap(), collection, id, fields);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Ok(self
            .collections
            .read()
            .unwrap()
            .get(collection)
            .and_then(|documents| documents.get(id))
            .cloned())
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>> {
        Ok(self
            .collections
            .read()
            .unwrap()
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(id, document)| (id.clone(), document.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub struct JsonFileStore {
    path: PathBuf,
    documents: MemoryStore,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<JsonFileStore> {
        let path = path.as_ref().to_path_buf();

        let collections = match tokio::fs::read(&path).await {
            Ok(contents) => parse_collections(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No store file at {}, starting empty", path.display());
                Collections::new()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        Ok(JsonFileStore {
            path,
            documents: MemoryStore::from_collections(collections),
            write_lock: Mutex::new(()),
        })
    }
}

fn parse_collections(contents: &[u8]) -> Result<Collections> {
    let raw: HashMap<String, BTreeMap<String, Value>> = serde_json::from_slice(contents)?;

    raw.into_iter()
        .map(|(collection, documents)| -> Result<(String, BTreeMap<String, Document>)> {
            let documents = documents
                .into_iter()
                .map(|(id, value)| match value {
                    Value::Object(document) => Ok((id, document)),
                    _ => Err(StoreError::NotAnObject {
                        collection: collection.clone(),
                        id,
                    }),
                })
                .collect::<Result<BTreeMap<_, _>>>()?;
            Ok((collection, documents))
        })
        .collect()
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn merge(&self, collection: &str, id: &str, fields: Document) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut collections = self.documents.snapshot();
        merge_fields(&mut collections, collection, id, fields);

        let contents = serde_json::to_vec_pretty(&collections)?;
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })?;

        self.documents.replace(collections);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.documents.get(collection, id).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>> {
        self.documents.list(collection).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: Value) -> Document {
        match value {
            Value::Object(document) => document,
            _ => panic!("test documents must be objects"),
        }
    }

    #[tokio::test]
    async fn merge_keeps_fields_missing_from_the_update() {
        let store = MemoryStore::new();
        store
            .merge("prs", "web-1", document(json!({"title": "old", "note": "kept"})))
            .await
            .unwrap();

        store
            .merge("prs", "web-1", document(json!({"title": "new", "approvals": 1})))
            .await
            .unwrap();

        assert_eq!(
            store.get("prs", "web-1").await.unwrap(),
            Some(document(json!({"title": "new", "note": "kept", "approvals": 1})))
        );
    }

    #[tokio::test]
    async fn list_is_ordered_by_id_and_empty_for_unknown_collections() {
        let store = MemoryStore::new();
        store.merge("prs", "b-1", Document::new()).await.unwrap();
        store.merge("prs", "a-2", Document::new()).await.unwrap();

        let ids: Vec<_> = store
            .list("prs")
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        assert_eq!(ids, ["a-2", "b-1"]);
        assert!(store.list("other").await.unwrap().is_empty());
        assert_eq!(store.get("other", "a-2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_survives_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = JsonFileStore::open(&path).await.unwrap();
        store
            .merge("metadata", "refresh", document(json!({"lastRefreshCount": 3})))
            .await
            .unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get("metadata", "refresh").await.unwrap(),
            Some(document(json!({"lastRefreshCount": 3})))
        );
    }

    #[tokio::test]
    async fn file_store_rejects_non_object_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        tokio::fs::write(&path, r#"{"prs": {"web-1": 4}}"#)
            .await
            .unwrap();

        let result = JsonFileStore::open(&path).await;

        assert!(matches!(result, Err(StoreError::NotAnObject { ref id, .. }) if id == "web-1"));
    }

    #[tokio::test]
    async fn unwritable_file_store_fails_the_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("store.json");
        let store = JsonFileStore::open(&path).await.unwrap();

        let result = store
            .merge("prs", "web-1", document(json!({"approvals": 1})))
            .await;

        assert!(matches!(result, Err(StoreError::Io { .. })));
        assert_eq!(store.get("prs", "web-1").await.unwrap(), None);
        assert!(store.list("prs").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_write_is_not_persisted_by_a_later_one() {
        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("later");
        let path = parent.join("store.json");
        let store = JsonFileStore::open(&path).await.unwrap();
        assert!(store
            .merge("prs", "web-1", document(json!({"approvals": 1})))
            .await
            .is_err());

        tokio::fs::create_dir(&parent).await.unwrap();
        store
            .merge("prs", "web-2", document(json!({"approvals": 0})))
            .await
            .unwrap();

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("prs", "web-1").await.unwrap(), None);
        assert!(reopened.get("prs", "web-2").await.unwrap().is_some());
    }
}
