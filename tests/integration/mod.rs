// Integration tests for Smart Price Scraper
// These tests drive full runs against an in-memory store and a scripted page driver

pub mod run_tests;
pub mod store_tests;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use smart_price_scraper::{
    AppConfig, AppError, RunOrchestrator,
    browser::{PageDriver, WaitCondition},
    sites::SiteRegistry,
    store::{Collection, MemoryStore, SetOptions, Store},
};

pub type DriverResult = Result<Arc<dyn PageDriver>, AppError>;

#[derive(Debug, Clone)]
pub enum PageScript {
    Html(String),
    Unreachable,
}

/// Serves canned pages chosen by the first pattern contained in the URL.
/// URLs that match nothing get an empty page.
#[derive(Default)]
pub struct ScriptedDriver {
    scripts: Vec<(String, PageScript)>,
    current: Mutex<Option<String>>,
    visits: Mutex<Vec<String>>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, pattern: &str, html: &str) -> Self {
        self.scripts.push((pattern.to_string(), PageScript::Html(html.to_string())));
        self
    }

    pub fn unreachable(mut self, pattern: &str) -> Self {
        self.scripts.push((pattern.to_string(), PageScript::Unreachable));
        self
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    pub fn visits_matching(&self, pattern: &str) -> usize {
        self.visits().iter().filter(|url| url.contains(pattern)).count()
    }
}

#[async_trait]
impl PageDriver for ScriptedDriver {
    async fn navigate(&self, url: &str, _wait: WaitCondition, _timeout: Duration) -> Result<(), AppError> {
        self.visits.lock().unwrap().push(url.to_string());

        let script = self
            .scripts
            .iter()
            .find(|(pattern, _)| url.contains(pattern.as_str()))
            .map(|(_, script)| script.clone());

        match script {
            Some(PageScript::Unreachable) => Err(AppError::connection(format!("net::ERR_CONNECTION_RESET at {}", url))),
            Some(PageScript::Html(html)) => {
                *self.current.lock().unwrap() = Some(html);
                Ok(())
            }
            None => {
                *self.current.lock().unwrap() = Some(EMPTY_PAGE.to_string());
                Ok(())
            }
        }
    }

    async fn content(&self) -> Result<String, AppError> {
        self.current
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::Internal("no page loaded".to_string()))
    }
}

pub const EMPTY_PAGE: &str = "<html><body><p>Không tìm thấy kết quả</p></body></html>";

pub fn dmx_page(name: &str, data_price: &str) -> String {
    format!(
        r#"<html><body>
            <a data-name="Ốp lưng" data-price="99000"></a>
            <div class="item" data-name="{name}" data-price="{data_price}" data-brand="Bosch" data-cate="Bếp từ">
                <strong class="price">{data_price}₫</strong>
            </div>
        </body></html>"#
    )
}

pub fn wellhome_page(name: &str, price: &str) -> String {
    format!(
        r#"<html><body>
            <div class="product-inner"><h3>{name}</h3><span class="price">{price}</span></div>
        </body></html>"#
    )
}

pub fn quanghanh_page(name: &str, price: &str) -> String {
    format!(
        r#"<html><body>
            <div class="product"><h3>{name}</h3><div class="prPrice">{price}</div></div>
        </body></html>"#
    )
}

/// Test configuration for integration tests
pub fn get_test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.store.url = "sqlite::memory:".to_string();
    config.scraper.retry_attempts = 2;
    config.scraper.retry_delay_ms = 1;
    config.scraper.settle_delay_ms = Some(0);
    config.scraper.inter_site_delay_ms = 0;
    config.scraper.inter_product_delay_ms = 0;
    config
}

pub fn orchestrator(store: Arc<MemoryStore>) -> RunOrchestrator {
    RunOrchestrator::new(store, SiteRegistry::standard(), get_test_config())
}

/// Launcher handing out a shared scripted driver.
pub fn launcher(driver: Arc<ScriptedDriver>) -> impl FnOnce() -> std::future::Ready<DriverResult> {
    move || std::future::ready(Ok(driver as Arc<dyn PageDriver>))
}

pub async fn seed_products(store: &MemoryStore, skus: &[&str]) -> anyhow::Result<()> {
    for (i, sku) in skus.iter().enumerate() {
        store
            .set(
                Collection::Products,
                &format!("product-{}", i + 1),
                json!({ "sku": sku, "name": format!("Product {}", sku) }),
                SetOptions::default(),
            )
            .await?;
    }
    Ok(())
}

pub async fn seed_schedule(store: &MemoryStore, document: Value) -> anyhow::Result<()> {
    store
        .set(Collection::ScheduleConfig, "main", document, SetOptions::default())
        .await?;
    Ok(())
}

pub async fn stored_schedule(store: &MemoryStore) -> anyhow::Result<Value> {
    store
        .get(Collection::ScheduleConfig, "main")
        .await?
        .ok_or_else(|| anyhow::anyhow!("schedule document missing"))
}

/// A 1h schedule whose next slot is a few minutes after `now`.
pub fn due_schedule(now: DateTime<Utc>) -> Value {
    let start = now + chrono::Duration::minutes(5);
    json!({
        "frequency": "1h",
        "startTime": start.format("%H:%M").to_string(),
        "isActive": true,
        "timezone": "UTC"
    })
}

/// A daily schedule whose slot is hours away from `now`.
pub fn distant_schedule(now: DateTime<Utc>) -> Value {
    let start = now + chrono::Duration::hours(3);
    json!({
        "frequency": "24h",
        "startTime": start.format("%H:%M").to_string(),
        "isActive": true,
        "timezone": "UTC"
    })
}
