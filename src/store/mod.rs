//! Document store the orchestrator and oracle read from and write to.
//!
//! Documents are JSON objects addressed by `(collection, id)`. Two backends
//! share the same semantics: [`SqliteStore`] for real runs and
//! [`MemoryStore`] for tests and dry runs.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;

use crate::utils::error::{AppError, Result};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type Document = Value;

const SERVER_TIMESTAMP_KEY: &str = "$serverTimestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    ScheduleConfig,
    Products,
    ScrapeSessions,
    PriceData,
    Suppliers,
    UrlMappings,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::ScheduleConfig => "scheduleConfig",
            Collection::Products => "products",
            Collection::ScrapeSessions => "scrapeSessions",
            Collection::PriceData => "priceData",
            Collection::Suppliers => "suppliers",
            Collection::UrlMappings => "urlMappings",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Shallow-merge top-level fields into an existing document.
    pub merge: bool,
}

impl SetOptions {
    pub fn merge() -> Self {
        Self { merge: true }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteOp {
    pub collection: Collection,
    pub id: String,
    pub document: Document,
    pub options: SetOptions,
}

impl WriteOp {
    pub fn set(collection: Collection, id: impl Into<String>, document: Document) -> Self {
        Self {
            collection,
            id: id.into(),
            document,
            options: SetOptions::default(),
        }
    }

    pub fn merge(collection: Collection, id: impl Into<String>, document: Document) -> Self {
        Self {
            options: SetOptions::merge(),
            ..Self::set(collection, id, document)
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    /// Fails when the backend cannot be reached.
    async fn ping(&self) -> Result<()>;

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>>;

    async fn set(&self, collection: Collection, id: &str, document: Document, options: SetOptions) -> Result<()>;

    /// Merges `fields` into an existing document; `NotFound` otherwise.
    async fn update(&self, collection: Collection, id: &str, fields: Document) -> Result<()>;

    /// Documents in insertion order.
    async fn query(&self, collection: Collection, limit: Option<usize>) -> Result<Vec<(String, Document)>>;

    /// All-or-nothing.
    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<()>;
}

/// Placeholder replaced with the store's clock when the document is written.
pub fn server_timestamp() -> Value {
    let mut marker = Map::new();
    marker.insert(SERVER_TIMESTAMP_KEY.to_string(), Value::Bool(true));
    Value::Object(marker)
}

pub fn is_server_timestamp(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.len() == 1 && map.get(SERVER_TIMESTAMP_KEY) == Some(&Value::Bool(true)))
}

/// Replaces top-level sentinels with `now` as RFC 3339.
pub fn resolve_server_timestamps(document: &mut Document, now: DateTime<Utc>) {
    if let Some(fields) = document.as_object_mut() {
        for value in fields.values_mut() {
            if is_server_timestamp(value) {
                *value = Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true));
            }
        }
    }
}

/// Shallow merge: top-level keys of `patch` overwrite those of `base`.
pub fn merge_documents(base: &mut Document, patch: Document) {
    match (base.as_object_mut(), patch) {
        (Some(target), Value::Object(fields)) => {
            for (key, value) in fields {
                target.insert(key, value);
            }
        }
        (_, patch) => *base = patch,
    }
}

pub(crate) fn ensure_object(collection: Collection, id: &str, document: &Document) -> Result<()> {
    if document.is_object() {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{}/{} must be a JSON object",
            collection, id
        )))
    }
}

pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    Ok(serde_json::to_value(value)?)
}

pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn Store,
    collection: Collection,
    id: &str,
) -> Result<Option<T>> {
    match store.get(collection, id).await? {
        Some(document) => Ok(Some(serde_json::from_value(document)?)),
        None => Ok(None),
    }
}

/// Deserializes every document, skipping (and logging) malformed ones.
pub async fn query_typed<T: DeserializeOwned>(
    store: &dyn Store,
    collection: Collection,
    limit: Option<usize>,
) -> Result<Vec<(String, T)>> {
    let documents = store.query(collection, limit).await?;
    let mut typed = Vec::with_capacity(documents.len());

    for (id, document) in documents {
        match serde_json::from_value(document) {
            Ok(value) => typed.push((id, value)),
            Err(e) => tracing::warn!(collection = %collection, id, error = %e, "Skipping malformed document"),
        }
    }

    Ok(typed)
}
