use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{
    Collection, Document, SetOptions, Store, WriteOp, ensure_object, merge_documents,
    resolve_server_timestamps,
};
use crate::utils::error::{AppError, Result};

type Table = Vec<(String, Document)>;

/// Process-local store with the same semantics as [`super::SqliteStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .await
            .get(&collection)
            .map_or(0, Vec::len)
    }

    fn apply_set(
        collections: &mut HashMap<Collection, Table>,
        collection: Collection,
        id: &str,
        mut document: Document,
        options: SetOptions,
    ) -> Result<()> {
        ensure_object(collection, id, &document)?;
        resolve_server_timestamps(&mut document, Utc::now());

        let table = collections.entry(collection).or_default();
        match table.iter_mut().find(|(key, _)| key == id) {
            Some((_, existing)) if options.merge => merge_documents(existing, document),
            Some((_, existing)) => *existing = document,
            None => table.push((id.to_string(), document)),
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|table| table.iter().find(|(key, _)| key == id))
            .map(|(_, document)| document.clone()))
    }

    async fn set(&self, collection: Collection, id: &str, document: Document, options: SetOptions) -> Result<()> {
        let mut collections = self.collections.write().await;
        Self::apply_set(&mut collections, collection, id, document, options)
    }

    async fn update(&self, collection: Collection, id: &str, mut fields: Document) -> Result<()> {
        ensure_object(collection, id, &fields)?;
        resolve_server_timestamps(&mut fields, Utc::now());

        let mut collections = self.collections.write().await;
        let existing = collections
            .get_mut(&collection)
            .and_then(|table| table.iter_mut().find(|(key, _)| key == id))
            .ok_or_else(|| AppError::not_found(format!("{}/{}", collection, id)))?;

        merge_documents(&mut existing.1, fields);
        Ok(())
    }

    async fn query(&self, collection: Collection, limit: Option<usize>) -> Result<Vec<(String, Document)>> {
        let collections = self.collections.read().await;
        let table = collections.get(&collection).map(Vec::as_slice).unwrap_or_default();
        Ok(table
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<()> {
        for op in &ops {
            ensure_object(op.collection, &op.id, &op.document)?;
        }

        let mut collections = self.collections.write().await;
        for op in ops {
            Self::apply_set(&mut collections, op.collection, &op.id, op.document, op.options)?;
        }
        Ok(())
    }
}
