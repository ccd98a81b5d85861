use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::browser::{PageDriver, PageSnapshot, WaitCondition};
use crate::models::Supplier;
use crate::utils::error::Result;

/// What one site reported for one SKU, before classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    pub name: Option<String>,
    pub price_text: Option<String>,
    /// Accepted price; only set when it cleared the sanity floor.
    pub price: Option<Decimal>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub found: bool,
}

impl RawResult {
    pub fn not_found() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub navigation_timeout: Duration,
    /// Replaces the site's own settle delay when set.
    pub settle_override: Option<Duration>,
}

/// One storefront. Implementations differ only in data: where to search and
/// which elements hold the name and the price.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    fn site_id(&self) -> &str;
    fn display_name(&self) -> &str;
    fn base_url(&self) -> &str;

    /// Sites keep rendering results after the network goes quiet.
    fn settle_delay(&self) -> Duration;

    fn build_url(&self, sku: &str) -> Result<String>;
    fn extract(&self, page: &PageSnapshot, sku: &str) -> Result<RawResult>;

    fn supplier(&self) -> Supplier {
        Supplier {
            id: self.site_id().to_string(),
            name: self.display_name().to_string(),
            base_url: self.base_url().to_string(),
        }
    }

    /// Navigate, let the page settle, then extract. Navigation is the only
    /// side effect.
    async fn fetch(
        &self,
        driver: &dyn PageDriver,
        url: &str,
        sku: &str,
        options: &FetchOptions,
    ) -> Result<RawResult> {
        tracing::debug!(site = self.site_id(), sku, url, "Navigating");
        driver
            .navigate(url, WaitCondition::NetworkIdle, options.navigation_timeout)
            .await?;

        let settle = options.settle_override.unwrap_or_else(|| self.settle_delay());
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }

        let html = driver.content().await?;
        let page = PageSnapshot::parse(&html);
        self.extract(&page, sku)
    }
}
