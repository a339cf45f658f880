use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::store::{Collection, DocumentStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub collection: Collection,
    pub id: String,
}

/// In-process document store. Writes are recorded in order so callers can
/// inspect exactly what a submission touched.
#[derive(Default)]
pub struct MemoryStore {
    documents: DashMap<(Collection, String), Value>,
    write_log: Mutex<Vec<WriteRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn writes(&self) -> Vec<WriteRecord> {
        self.write_log.lock().await.clone()
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.documents
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .count()
    }

    pub fn is_empty(&self, collection: Collection) -> bool {
        self.len(collection) == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .documents
            .get(&(collection, id.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn set_merge(
        &self,
        collection: Collection,
        id: &str,
        fields: Value,
    ) -> Result<(), StoreError> {
        let Value::Object(fields) = fields else {
            return Err(StoreError::NotAnObject {
                collection,
                id: id.to_string(),
            });
        };

        {
            let mut entry = self
                .documents
                .entry((collection, id.to_string()))
                .or_insert_with(|| Value::Object(Default::default()));

            match entry.value_mut() {
                Value::Object(existing) => existing.extend(fields),
                other => *other = Value::Object(fields),
            }
        }

        self.write_log.lock().await.push(WriteRecord {
            collection,
            id: id.to_string(),
        });
        Ok(())
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .documents
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .map(|entry| entry.value().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{MemoryStore, WriteRecord};
    use crate::store::{Collection, DocumentStore, StoreError};

    #[tokio::test]
    async fn merge_preserves_fields_absent_from_the_write() {
        let store = MemoryStore::new();
        store
            .set_merge(
                Collection::Pickups,
                "p1",
                json!({ "id": "p1", "status": 1, "impact_data_dairy": 40.0 }),
            )
            .await
            .unwrap();
        store
            .set_merge(Collection::Pickups, "p1", json!({ "status": 9 }))
            .await
            .unwrap();

        let doc = store.get(Collection::Pickups, "p1").await.unwrap().unwrap();
        assert_eq!(doc["status"], 9);
        assert_eq!(doc["impact_data_dairy"], 40.0);
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = MemoryStore::new();
        store
            .set_merge(Collection::Pickups, "s1", json!({ "id": "s1" }))
            .await
            .unwrap();

        assert!(store.get(Collection::Deliveries, "s1").await.unwrap().is_none());
        assert_eq!(store.len(Collection::Pickups), 1);
        assert!(store.is_empty(Collection::Routes));
    }

    #[tokio::test]
    async fn write_log_keeps_order() {
        let store = MemoryStore::new();
        store
            .set_merge(Collection::Pickups, "a", json!({}))
            .await
            .unwrap();
        store
            .set_merge(Collection::Routes, "r", json!({}))
            .await
            .unwrap();

        assert_eq!(
            store.writes().await,
            vec![
                WriteRecord {
                    collection: Collection::Pickups,
                    id: "a".to_string()
                },
                WriteRecord {
                    collection: Collection::Routes,
                    id: "r".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn non_object_write_is_rejected() {
        let store = MemoryStore::new();
        let err = store
            .set_merge(Collection::Routes, "r", json!([1, 2, 3]))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::NotAnObject { .. }));
        assert!(store.writes().await.is_empty());
    }
}
