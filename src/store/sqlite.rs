use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;

use super::{
    Collection, Document, SetOptions, Store, WriteOp, ensure_object, merge_documents,
    resolve_server_timestamps,
};
use crate::config::StoreConfig;
use crate::utils::error::{AppError, Result};

const UPSERT: &str = r#"
    INSERT INTO documents (collection, id, body, updated_at)
    VALUES (?, ?, ?, ?)
    ON CONFLICT (collection, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at
"#;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let in_memory = config.url.contains(":memory:");
        if !in_memory {
            create_parent_dir(&config.url)?;
        }

        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

        // Every connection to `:memory:` is its own database.
        let mut pool_options = SqlitePoolOptions::new();
        pool_options = if in_memory {
            pool_options.max_connections(1).idle_timeout(None).max_lifetime(None)
        } else {
            pool_options.max_connections(config.max_connections)
        };

        let pool = pool_options.connect_with(options).await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(sqlx::Error::from)?;

        tracing::info!(url = %config.url, "Document store ready");
        Ok(Self { pool })
    }

    async fn load(
        executor: impl sqlx::SqliteExecutor<'_>,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = ? AND id = ?")
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(executor)
            .await?;

        match row {
            Some(row) => {
                let body: String = row.try_get("body")?;
                Ok(Some(serde_json::from_str(&body)?))
            }
            None => Ok(None),
        }
    }

    async fn write(
        executor: impl sqlx::SqliteExecutor<'_>,
        collection: Collection,
        id: &str,
        document: &Document,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        sqlx::query(UPSERT)
            .bind(collection.as_str())
            .bind(id)
            .bind(serde_json::to_string(document)?)
            .bind(now)
            .execute(executor)
            .await?;
        Ok(())
    }
}

fn create_parent_dir(url: &str) -> Result<()> {
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or(path);

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::connection(format!("Store unreachable: {}", e)))?;
        Ok(())
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        Self::load(&self.pool, collection, id).await
    }

    async fn set(&self, collection: Collection, id: &str, mut document: Document, options: SetOptions) -> Result<()> {
        ensure_object(collection, id, &document)?;
        resolve_server_timestamps(&mut document, Utc::now());

        let mut tx = self.pool.begin().await?;
        if options.merge {
            if let Some(mut existing) = Self::load(&mut *tx, collection, id).await? {
                merge_documents(&mut existing, document);
                document = existing;
            }
        }
        Self::write(&mut *tx, collection, id, &document).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update(&self, collection: Collection, id: &str, mut fields: Document) -> Result<()> {
        ensure_object(collection, id, &fields)?;
        resolve_server_timestamps(&mut fields, Utc::now());

        let mut tx = self.pool.begin().await?;
        let mut existing = Self::load(&mut *tx, collection, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("{}/{}", collection, id)))?;

        merge_documents(&mut existing, fields);
        Self::write(&mut *tx, collection, id, &existing).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, collection: Collection, limit: Option<usize>) -> Result<Vec<(String, Document)>> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map_or(-1, |n| n as i64);

        let rows = sqlx::query("SELECT id, body FROM documents WHERE collection = ? ORDER BY seq LIMIT ?")
            .bind(collection.as_str())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| -> Result<(String, Document)> {
                let id: String = row.try_get("id")?;
                let body: String = row.try_get("body")?;
                Ok((id, serde_json::from_str(&body)?))
            })
            .collect()
    }

    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for op in ops {
            ensure_object(op.collection, &op.id, &op.document)?;
            let mut document = op.document;
            resolve_server_timestamps(&mut document, now);

            if op.options.merge {
                if let Some(mut existing) = Self::load(&mut *tx, op.collection, &op.id).await? {
                    merge_documents(&mut existing, document);
                    document = existing;
                }
            }
            Self::write(&mut *tx, op.collection, &op.id, &document).await?;
        }

        // Dropping the transaction on an early return rolls it back.
        tx.commit().await?;
        tracing::debug!("Batch committed");
        Ok(())
    }
}
