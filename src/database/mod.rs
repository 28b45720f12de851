//! Record store adapter: get/put/scan/update/delete over the three logical tables.
//!
//! Adapters only see BSON documents keyed by an opaque string ID. Typed access goes
//! through the helpers at the bottom of this module, which also retry idempotent
//! reads on transient failures. Writes are never retried.

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use async_trait::async_trait;
use mongodb::bson::{self, Document};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Users,
    Courses,
    Books,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Courses => "courses",
            Table::Books => "books",
        }
    }

    pub fn key_field(&self) -> &'static str {
        match self {
            Table::Users => "user_id",
            Table::Courses => "course_id",
            Table::Books => "book_id",
        }
    }

    /// Fields that must be unique across the table, besides the key.
    pub fn unique_fields(&self) -> &'static [&'static str] {
        match self {
            Table::Users => &["user_email"],
            Table::Courses | Table::Books => &[],
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Timeout or connectivity problem; safe to retry for reads
    #[error("transient store failure: {0}")]
    Transient(String),

    /// Unique constraint violated
    #[error("{0}")]
    Conflict(String),

    #[error("record (de)serialization failed: {0}")]
    Serialization(String),

    #[error("store failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl From<bson::ser::Error> for StoreError {
    fn from(err: bson::ser::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<bson::de::Error> for StoreError {
    fn from(err: bson::de::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short backend name reported by the health check.
    fn backend(&self) -> &'static str;

    /// Round-trip to the backend; in-process stores are always reachable.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get(&self, table: Table, key: &str) -> Result<Option<Document>, StoreError>;

    /// Inserts or fully replaces the record under its key field.
    async fn put(&self, table: Table, item: Document) -> Result<(), StoreError>;

    /// Every record of the table. O(table size); listings only.
    async fn scan(&self, table: Table) -> Result<Vec<Document>, StoreError>;

    /// Secondary index lookup: records whose `field` equals `value`, or whose `field`
    /// is an array containing `value`.
    async fn find_by(&self, table: Table, field: &str, value: &str) -> Result<Vec<Document>, StoreError>;

    /// Sparse update: only the supplied fields change. Returns the full record after
    /// the update, or `None` when the key does not exist.
    async fn update_fields(
        &self,
        table: Table,
        key: &str,
        fields: Document,
    ) -> Result<Option<Document>, StoreError>;

    /// Returns whether a record was removed.
    async fn delete(&self, table: Table, key: &str) -> Result<bool, StoreError>;
}

const READ_ATTEMPTS: u32 = 3;
const READ_BACKOFF: Duration = Duration::from_millis(50);

/// Runs an idempotent read, retrying transient failures with linear backoff.
pub async fn retry_read<T, F, Fut>(what: &str, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < READ_ATTEMPTS => {
                log::warn!("⚠️  {} failed (attempt {}/{}): {}", what, attempt, READ_ATTEMPTS, e);
                tokio::time::sleep(READ_BACKOFF * attempt).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

pub async fn fetch<T: DeserializeOwned>(
    store: &dyn RecordStore,
    table: Table,
    key: &str,
) -> Result<Option<T>, StoreError> {
    let found = retry_read(table.name(), || store.get(table, key)).await?;
    found.map(|doc| bson::from_document(doc).map_err(StoreError::from)).transpose()
}

pub async fn fetch_all<T: DeserializeOwned>(
    store: &dyn RecordStore,
    table: Table,
) -> Result<Vec<T>, StoreError> {
    let docs = retry_read(table.name(), || store.scan(table)).await?;
    decode_all(docs)
}

pub async fn fetch_by<T: DeserializeOwned>(
    store: &dyn RecordStore,
    table: Table,
    field: &str,
    value: &str,
) -> Result<Vec<T>, StoreError> {
    let docs = retry_read(table.name(), || store.find_by(table, field, value)).await?;
    decode_all(docs)
}

pub async fn save<T: Serialize>(store: &dyn RecordStore, table: Table, item: &T) -> Result<(), StoreError> {
    store.put(table, bson::to_document(item)?).await
}

/// Applies a sparse update built from any serialisable partial struct.
pub async fn patch<T: DeserializeOwned>(
    store: &dyn RecordStore,
    table: Table,
    key: &str,
    fields: Document,
) -> Result<Option<T>, StoreError> {
    let updated = store.update_fields(table, key, fields).await?;
    updated.map(|doc| bson::from_document(doc).map_err(StoreError::from)).transpose()
}

fn decode_all<T: DeserializeOwned>(docs: Vec<Document>) -> Result<Vec<T>, StoreError> {
    docs.into_iter()
        .map(|doc| bson::from_document(doc).map_err(StoreError::from))
        .collect()
}
