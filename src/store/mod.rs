pub mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Pickups,
    Deliveries,
    Routes,
    Organizations,
    Locations,
    Users,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Pickups => "pickups",
            Collection::Deliveries => "deliveries",
            Collection::Routes => "routes",
            Collection::Organizations => "organizations",
            Collection::Locations => "locations",
            Collection::Users => "users",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    #[error("document {collection}/{id} is not an object")]
    NotAnObject { collection: Collection, id: String },

    #[error("malformed document: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Keyed document collections with merge-on-write semantics.
///
/// `set_merge` overwrites the top-level fields present in `fields` and keeps
/// every other field of an existing document. Nothing in this crate deletes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError>;

    async fn set_merge(&self, collection: Collection, id: &str, fields: Value)
    -> Result<(), StoreError>;

    async fn list(&self, collection: Collection) -> Result<Vec<Value>, StoreError>;
}

pub async fn exists(
    store: &dyn DocumentStore,
    collection: Collection,
    id: &str,
) -> Result<bool, StoreError> {
    Ok(store.get(collection, id).await?.is_some())
}

pub async fn fetch<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    id: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(collection, id).await? {
        Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
        None => Ok(None),
    }
}

pub async fn fetch_all<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
) -> Result<Vec<T>, StoreError> {
    store
        .list(collection)
        .await?
        .into_iter()
        .map(|doc| serde_json::from_value(doc).map_err(StoreError::from))
        .collect()
}

pub async fn upsert<T: Serialize>(
    store: &dyn DocumentStore,
    collection: Collection,
    id: &str,
    document: &T,
) -> Result<(), StoreError> {
    let fields = serde_json::to_value(document)?;
    store.set_merge(collection, id, fields).await
}
