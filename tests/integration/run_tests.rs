use super::*;
use rust_decimal::Decimal;
use smart_price_scraper::RunOutcome;
use smart_price_scraper::models::{PriceRecord, RunSession, RunType, ScrapeStatus};
use smart_price_scraper::oracle::SkipReason;
use smart_price_scraper::store::{Collection, MemoryStore, SetOptions, Store};
use std::sync::atomic::{AtomicBool, Ordering};

fn partial_failure_driver() -> ScriptedDriver {
    ScriptedDriver::new()
        .page("dienmayxanh.com", &dmx_page("Bếp từ Bosch HBD46PPI60", "12490000"))
        .page("wellhome.asia", &wellhome_page("Nồi cơm điện Toshiba RC-18", "1.290.000₫"))
        .unreachable("dienmayquanghanh.com")
}

#[tokio::test]
async fn test_partial_failure_run() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    seed_products(&store, &["HBD46PPI60"]).await?;
    let driver = Arc::new(partial_failure_driver());

    let outcome = orchestrator(store.clone())
        .execute(RunType::Manual, Utc::now(), launcher(driver.clone()))
        .await?;

    let RunOutcome::Completed(report) = outcome else {
        panic!("manual runs always execute");
    };

    let statuses: Vec<ScrapeStatus> = report.records.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![ScrapeStatus::FoundWithPrice, ScrapeStatus::NoInfo, ScrapeStatus::Error]
    );
    assert_eq!(report.session.total_results, 3);
    assert_eq!(report.session.success_count, 1);

    let dmx = &report.records[0];
    assert_eq!(dmx.numeric_price, Some(Decimal::from(12_490_000)));
    assert_eq!(dmx.price_formatted.as_deref(), Some("12.490.000₫"));
    assert_eq!(dmx.brand.as_deref(), Some("Bosch"));

    let qh = &report.records[2];
    assert!(qh.numeric_price.is_none());
    assert!(qh.error.as_deref().unwrap_or_default().contains("ERR_CONNECTION_RESET"));

    // The unreachable site was retried up to the configured attempts.
    assert_eq!(driver.visits_matching("dienmayquanghanh.com"), 2);
    assert_eq!(driver.visits_matching("dienmayxanh.com"), 1);

    // Session and every record persisted regardless of the failure.
    let sessions = store.query(Collection::ScrapeSessions, None).await?;
    assert_eq!(sessions.len(), 1);
    let (session_id, session_doc) = &sessions[0];
    assert_eq!(session_id, &report.session.id);
    assert!(session_doc["createdAt"].is_string());
    let stored: RunSession = serde_json::from_value(session_doc.clone())?;
    assert_eq!(stored.success_count, 1);
    assert_eq!(stored.total_results, 3);

    let records = store.query(Collection::PriceData, None).await?;
    assert_eq!(records.len(), 3);
    let first: PriceRecord = serde_json::from_value(records[0].1.clone())?;
    assert_eq!(first.supplier_id, "dmx");
    assert_eq!(first.session_id, report.session.id);

    assert_eq!(store.len(Collection::Suppliers).await, 3);
    Ok(())
}

#[tokio::test]
async fn test_numeric_price_only_with_price_status() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    seed_products(&store, &["HBD46PPI60", "PUE611BB5E"]).await?;
    let driver = Arc::new(
        ScriptedDriver::new()
            .page("key=HBD46PPI60", &dmx_page("Bếp từ Bosch HBD46PPI60", "12490000"))
            .page("wellhome.asia", &wellhome_page("Bếp từ Bosch", "Liên hệ"))
            .unreachable("dienmayquanghanh.com"),
    );

    let outcome = orchestrator(store)
        .execute(RunType::Default, Utc::now(), launcher(driver))
        .await?;

    for record in outcome.records() {
        assert_eq!(
            record.numeric_price.is_some(),
            record.status == ScrapeStatus::FoundWithPrice,
            "{} at {}",
            record.sku,
            record.supplier_id
        );
    }
    assert!(
        outcome
            .records()
            .iter()
            .any(|r| r.status == ScrapeStatus::FoundNoPrice)
    );
    Ok(())
}

#[tokio::test]
async fn test_records_follow_catalog_and_site_order() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    seed_products(&store, &["SMS6ZCI49E", "HBD46PPI60", "DWB97DM50"]).await?;

    let outcome = orchestrator(store.clone())
        .execute(RunType::Manual, Utc::now(), launcher(Arc::new(ScriptedDriver::new())))
        .await?;

    let order: Vec<(String, String)> = outcome
        .records()
        .iter()
        .map(|r| (r.sku.clone(), r.supplier_id.clone()))
        .collect();

    let mut expected = Vec::new();
    for sku in ["SMS6ZCI49E", "HBD46PPI60", "DWB97DM50"] {
        for site in ["dmx", "wh", "qh"] {
            expected.push((sku.to_string(), site.to_string()));
        }
    }
    assert_eq!(order, expected);

    let persisted: Vec<String> = store
        .query(Collection::PriceData, None)
        .await?
        .into_iter()
        .map(|(_, doc)| format!("{}/{}", doc["sku"].as_str().unwrap(), doc["supplierId"].as_str().unwrap()))
        .collect();
    assert_eq!(persisted.len(), 9);
    assert_eq!(persisted[0], "SMS6ZCI49E/dmx");
    assert_eq!(persisted[8], "DWB97DM50/qh");
    Ok(())
}

#[tokio::test]
async fn test_sample_catalog_when_store_empty() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());

    let outcome = orchestrator(store)
        .execute(RunType::Manual, Utc::now(), launcher(Arc::new(ScriptedDriver::new())))
        .await?;

    let skus: Vec<&str> = outcome.records().iter().map(|r| r.sku.as_str()).collect();
    assert_eq!(
        skus,
        vec![
            "HMH.QUYDR2.23E",
            "HMH.QUYDR2.23E",
            "HMH.QUYDR2.23E",
            "HBD46PPI60",
            "HBD46PPI60",
            "HBD46PPI60"
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_url_mapping_overrides_search_url() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    seed_products(&store, &["HBD46PPI60"]).await?;
    let mapped = "https://wellhome.asia/products/bep-tu-bosch-hbd46ppi60";
    store
        .set(
            Collection::UrlMappings,
            "HBD46PPI60",
            json!({ "urls": { "wh": mapped } }),
            SetOptions::default(),
        )
        .await?;

    let driver = Arc::new(ScriptedDriver::new());
    let outcome = orchestrator(store)
        .execute(RunType::Manual, Utc::now(), launcher(driver.clone()))
        .await?;

    let wh = outcome
        .records()
        .iter()
        .find(|r| r.supplier_id == "wh")
        .expect("wellhome record");
    assert_eq!(wh.source_url, mapped);
    assert!(driver.visits().contains(&mapped.to_string()));
    assert!(
        driver
            .visits()
            .contains(&"https://www.dienmayxanh.com/search?key=HBD46PPI60".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn test_scheduled_skip_writes_nothing() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    seed_schedule(&store, distant_schedule(now)).await?;
    let launched = AtomicBool::new(false);

    let outcome = orchestrator(store.clone())
        .execute(RunType::Scheduled, now, || {
            launched.store(true, Ordering::SeqCst);
            std::future::ready(Ok(Arc::new(ScriptedDriver::new()) as Arc<dyn PageDriver>))
        })
        .await?;

    assert!(matches!(
        outcome,
        RunOutcome::Skipped {
            reason: SkipReason::TooEarly { .. },
            ..
        }
    ));
    assert!(!launched.load(Ordering::SeqCst));
    assert_eq!(store.len(Collection::ScrapeSessions).await, 0);
    assert_eq!(store.len(Collection::PriceData).await, 0);
    assert!(stored_schedule(&store).await?.get("lastRun").is_none());
    Ok(())
}

#[tokio::test]
async fn test_scheduled_without_config_skips() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());

    let outcome = orchestrator(store)
        .execute(RunType::Scheduled, Utc::now(), launcher(Arc::new(ScriptedDriver::new())))
        .await?;

    assert!(matches!(
        outcome,
        RunOutcome::Skipped {
            reason: SkipReason::InvalidConfig(_),
            ..
        }
    ));
    Ok(())
}

#[tokio::test]
async fn test_forced_and_manual_bypass_schedule() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    seed_products(&store, &["HBD46PPI60"]).await?;
    seed_schedule(
        &store,
        json!({ "frequency": "6h", "startTime": "09:00", "isActive": false }),
    )
    .await?;

    for run_type in [RunType::Forced, RunType::Manual, RunType::Default] {
        let outcome = orchestrator(store.clone())
            .execute(run_type, Utc::now(), launcher(Arc::new(ScriptedDriver::new())))
            .await?;

        let RunOutcome::Completed(report) = outcome else {
            panic!("{} runs ignore the schedule", run_type);
        };
        assert_eq!(report.session.run_type, run_type);
        assert!(report.session.id.ends_with(run_type.as_str()));
        assert!(report.records.iter().all(|r| !r.is_scheduled));
    }

    // Non-scheduled runs leave lastRun alone.
    assert!(stored_schedule(&store).await?.get("lastRun").is_none());
    assert_eq!(store.len(Collection::ScrapeSessions).await, 3);
    Ok(())
}
