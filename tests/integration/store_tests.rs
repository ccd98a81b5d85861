use super::*;
use smart_price_scraper::config::StoreConfig;
use smart_price_scraper::store::{Collection, MemoryStore, SetOptions, SqliteStore, Store, WriteOp, server_timestamp};
use tempfile::TempDir;

/// Behaviour both backends must share.
async fn exercise_store(store: &dyn Store) -> anyhow::Result<()> {
    store.ping().await?;
    assert!(store.get(Collection::ScheduleConfig, "main").await?.is_none());

    store
        .set(
            Collection::ScheduleConfig,
            "main",
            json!({ "frequency": "6h", "startTime": "09:00", "isActive": true }),
            SetOptions::default(),
        )
        .await?;
    store
        .update(
            Collection::ScheduleConfig,
            "main",
            json!({ "lastRun": server_timestamp(), "updatedAt": server_timestamp() }),
        )
        .await?;

    let schedule = store.get(Collection::ScheduleConfig, "main").await?.expect("schedule");
    assert_eq!(schedule["frequency"], "6h");
    let last_run: DateTime<Utc> = serde_json::from_value(schedule["lastRun"].clone())?;
    assert!((Utc::now() - last_run).num_seconds().abs() < 60);

    assert!(
        store
            .update(Collection::ScheduleConfig, "other", json!({ "isActive": false }))
            .await
            .is_err()
    );

    store
        .batch_write(vec![
            WriteOp::merge(Collection::Suppliers, "dmx", json!({ "name": "Điện Máy Xanh" })),
            WriteOp::set(Collection::ScrapeSessions, "s1", json!({ "createdAt": server_timestamp() })),
            WriteOp::set(Collection::PriceData, "r2", json!({ "sku": "B" })),
            WriteOp::set(Collection::PriceData, "r1", json!({ "sku": "A" })),
        ])
        .await?;
    store
        .batch_write(vec![WriteOp::merge(
            Collection::Suppliers,
            "dmx",
            json!({ "baseUrl": "https://www.dienmayxanh.com" }),
        )])
        .await?;

    let supplier = store.get(Collection::Suppliers, "dmx").await?.expect("supplier");
    assert_eq!(supplier["name"], "Điện Máy Xanh");
    assert_eq!(supplier["baseUrl"], "https://www.dienmayxanh.com");

    let session = store.get(Collection::ScrapeSessions, "s1").await?.expect("session");
    assert!(session["createdAt"].is_string());

    let skus: Vec<String> = store
        .query(Collection::PriceData, None)
        .await?
        .into_iter()
        .map(|(_, doc)| doc["sku"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(skus, vec!["B", "A"]);

    Ok(())
}

#[tokio::test]
async fn test_memory_store_semantics() -> anyhow::Result<()> {
    exercise_store(&MemoryStore::new()).await
}

#[tokio::test]
async fn test_sqlite_store_semantics() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let config = StoreConfig {
        url: format!("sqlite://{}/prices.db", dir.path().display()),
        max_connections: 2,
    };
    let store = SqliteStore::connect(&config).await?;
    exercise_store(&store).await
}

#[tokio::test]
async fn test_sqlite_run_persists_session() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let config = StoreConfig {
        url: format!("sqlite://{}/prices.db", dir.path().display()),
        max_connections: 2,
    };
    let store = Arc::new(SqliteStore::connect(&config).await?);

    let orchestrator = RunOrchestrator::new(store.clone(), SiteRegistry::standard(), get_test_config());
    let outcome = orchestrator
        .execute(
            smart_price_scraper::models::RunType::Manual,
            Utc::now(),
            launcher(Arc::new(ScriptedDriver::new())),
        )
        .await?;

    assert_eq!(store.query(Collection::PriceData, None).await?.len(), outcome.records().len());
    assert_eq!(store.query(Collection::ScrapeSessions, None).await?.len(), 1);
    assert_eq!(store.query(Collection::Suppliers, None).await?.len(), 3);
    Ok(())
}
