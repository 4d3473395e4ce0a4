//! Document store: the read-optimized JSON copy of the relational data.
//!
//! The relational database is authoritative. Services mirror every mutation
//! here through [`DualWriter`] after the relational write succeeded; a failed
//! mirror is logged and otherwise ignored, and `course-market sync` rebuilds
//! the collections from scratch.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::cache::cache_error;
use crate::config::{DOCUMENT_KEY_PREFIX, DOCUMENT_STORE_MEMORY};
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Document collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Courses,
    Lessons,
    Categories,
    Instructors,
    Reviews,
    Enrollments,
    Orders,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Courses,
        Collection::Lessons,
        Collection::Categories,
        Collection::Instructors,
        Collection::Reviews,
        Collection::Enrollments,
        Collection::Orders,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Courses => "courses",
            Collection::Lessons => "lessons",
            Collection::Categories => "categories",
            Collection::Instructors => "instructors",
            Collection::Reviews => "reviews",
            Collection::Enrollments => "enrollments",
            Collection::Orders => "orders",
        }
    }

    /// Redis hash holding the collection
    pub fn key(&self) -> String {
        format!("{}{}", DOCUMENT_KEY_PREFIX, self.as_str())
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown collection '{}'", s))
    }
}

/// Keyed JSON document storage, one namespace per [`Collection`].
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or replace a document
    async fn upsert(&self, collection: Collection, id: Uuid, document: Value) -> AppResult<()>;

    /// Remove a document; missing documents are not an error
    async fn delete(&self, collection: Collection, id: Uuid) -> AppResult<()>;

    async fn get(&self, collection: Collection, id: Uuid) -> AppResult<Option<Value>>;

    /// Every document of a collection, in no particular order
    async fn list(&self, collection: Collection) -> AppResult<Vec<Value>>;

    /// Drop a whole collection, returning how many documents it held
    async fn clear(&self, collection: Collection) -> AppResult<u64>;

    async fn ping(&self) -> AppResult<()>;
}

/// Collections stored as Redis hashes (`docs:<collection>` → id → JSON).
pub struct RedisDocumentStore {
    connection: ConnectionManager,
}

impl RedisDocumentStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl DocumentStore for RedisDocumentStore {
    async fn upsert(&self, collection: Collection, id: Uuid, document: Value) -> AppResult<()> {
        let json = serde_json::to_string(&document)
            .map_err(|e| AppError::internal(format!("Document serialization error: {}", e)))?;

        let mut conn = self.connection.clone();
        let _: () = conn
            .hset(collection.key(), id.to_string(), json)
            .await
            .map_err(cache_error)?;
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: i64 = conn
            .hdel(collection.key(), id.to_string())
            .await
            .map_err(cache_error)?;
        Ok(())
    }

    async fn get(&self, collection: Collection, id: Uuid) -> AppResult<Option<Value>> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn
            .hget(collection.key(), id.to_string())
            .await
            .map_err(cache_error)?;

        raw.map(|json| decode(collection, &json)).transpose()
    }

    async fn list(&self, collection: Collection) -> AppResult<Vec<Value>> {
        let mut conn = self.connection.clone();
        let raw: Vec<String> = conn.hvals(collection.key()).await.map_err(cache_error)?;

        raw.iter().map(|json| decode(collection, json)).collect()
    }

    async fn clear(&self, collection: Collection) -> AppResult<u64> {
        let mut conn = self.connection.clone();
        let count: u64 = conn.hlen(collection.key()).await.map_err(cache_error)?;
        let _: i64 = conn.del(collection.key()).await.map_err(cache_error)?;
        Ok(count)
    }

    async fn ping(&self) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(())
    }
}

fn decode(collection: Collection, json: &str) -> AppResult<Value> {
    serde_json::from_str(json).map_err(|e| {
        AppError::internal(format!("Corrupt document in {}: {}", collection, e))
    })
}

/// Open the store named by `DOCUMENT_STORE_URL`: `memory` or a Redis URL.
pub async fn open_document_store(url: &str) -> Result<Arc<dyn DocumentStore>, RedisError> {
    if url == DOCUMENT_STORE_MEMORY {
        tracing::warn!("Using the in-memory document store; documents are lost on restart");
        return Ok(Arc::new(InMemoryDocumentStore::new()));
    }

    let connection = ConnectionManager::new(Client::open(url)?).await?;
    tracing::info!("Document store connected");
    Ok(Arc::new(RedisDocumentStore::new(connection)))
}

/// Process-local store for development and tests.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<Collection, BTreeMap<Uuid, Value>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub async fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .await
            .get(&collection)
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn upsert(&self, collection: Collection, id: Uuid, document: Value) -> AppResult<()> {
        self.collections
            .write()
            .await
            .entry(collection)
            .or_default()
            .insert(id, document);
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> AppResult<()> {
        if let Some(docs) = self.collections.write().await.get_mut(&collection) {
            docs.remove(&id);
        }
        Ok(())
    }

    async fn get(&self, collection: Collection, id: Uuid) -> AppResult<Option<Value>> {
        Ok(self
            .collections
            .read()
            .await
            .get(&collection)
            .and_then(|docs| docs.get(&id).cloned()))
    }

    async fn list(&self, collection: Collection) -> AppResult<Vec<Value>> {
        Ok(self
            .collections
            .read()
            .await
            .get(&collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn clear(&self, collection: Collection) -> AppResult<u64> {
        Ok(self
            .collections
            .write()
            .await
            .remove(&collection)
            .map_or(0, |docs| docs.len() as u64))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Best-effort mirror of relational writes into the document store.
#[derive(Clone)]
pub struct DualWriter {
    store: Arc<dyn DocumentStore>,
}

impl DualWriter {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    /// Serialize and upsert `document`. Failures are logged, never returned.
    pub async fn mirror<T: Serialize + Sync>(&self, collection: Collection, id: Uuid, document: &T) {
        let value = match serde_json::to_value(document) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(%collection, document_id = %id, error = %e, "Document serialization failed");
                return;
            }
        };

        match self.store.upsert(collection, id, value).await {
            Ok(()) => tracing::debug!(%collection, document_id = %id, "Document mirrored"),
            Err(e) => {
                tracing::warn!(%collection, document_id = %id, error = %e, "Document mirror failed")
            }
        }
    }

    /// Delete a mirrored document. Failures are logged, never returned.
    pub async fn remove(&self, collection: Collection, id: Uuid) {
        if let Err(e) = self.store.delete(collection, id).await {
            tracing::warn!(%collection, document_id = %id, error = %e, "Document removal failed");
        }
    }

    pub async fn remove_all(&self, collection: Collection, ids: &[Uuid]) {
        for id in ids {
            self.remove(collection, *id).await;
        }
    }
}

/// Read and decode a whole collection. Documents that no longer match `T`
/// are skipped with a warning.
pub async fn load_collection<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
) -> AppResult<Vec<T>> {
    let docs = store.list(collection).await?;
    let mut out = Vec::with_capacity(docs.len());

    for doc in docs {
        match serde_json::from_value(doc) {
            Ok(item) => out.push(item),
            Err(e) => tracing::warn!(%collection, error = %e, "Skipping undecodable document"),
        }
    }

    Ok(out)
}
