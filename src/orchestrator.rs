use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::browser::PageDriver;
use crate::config::AppConfig;
use crate::logging::StepTimer;
use crate::models::{NewPriceRecord, PriceRecord, Product, RunSession, RunType, ScheduleConfig, UrlMapping};
use crate::oracle::{self, ScheduleDecision, SkipReason};
use crate::retry::{RetryOutcome, RetryPolicy, with_retry};
use crate::sites::{FetchOptions, SiteAdapter, SiteRegistry};
use crate::store::{self, Collection, Document, Store, WriteOp, server_timestamp};
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Deciding,
    Running,
    Persisting,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::Deciding => "deciding",
            RunPhase::Running => "running",
            RunPhase::Persisting => "persisting",
            RunPhase::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub session: RunSession,
    pub records: Vec<PriceRecord>,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Skipped { run_type: RunType, reason: SkipReason },
    Completed(RunReport),
}

impl RunOutcome {
    pub fn records(&self) -> &[PriceRecord] {
        match self {
            RunOutcome::Completed(report) => &report.records,
            RunOutcome::Skipped { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityReport {
    pub config_exists: bool,
    pub products_available: bool,
}

/// Drives one invocation: optional schedule check, the catalog × sites
/// matrix, then a single batch write.
pub struct RunOrchestrator {
    store: Arc<dyn Store>,
    sites: SiteRegistry,
    config: AppConfig,
}

impl RunOrchestrator {
    pub fn new(store: Arc<dyn Store>, sites: SiteRegistry, config: AppConfig) -> Self {
        Self { store, sites, config }
    }

    /// `launch` is only awaited once the run is certain, so a skipped
    /// scheduled invocation never starts a browser.
    pub async fn execute<L, Fut>(&self, run_type: RunType, now: DateTime<Utc>, launch: L) -> Result<RunOutcome>
    where
        L: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn PageDriver>>>,
    {
        self.enter(RunPhase::Idle, run_type);

        if run_type.consults_oracle() {
            self.enter(RunPhase::Deciding, run_type);
            let decision = self.decide(now).await?;
            tracing::info!(decision = %decision, "Schedule evaluated");

            if let ScheduleDecision::Skip(reason) = decision {
                self.enter(RunPhase::Done, run_type);
                return Ok(RunOutcome::Skipped { run_type, reason });
            }
        }

        let driver = launch().await?;

        self.enter(RunPhase::Running, run_type);
        let started_at = Utc::now();
        let session_id = RunSession::session_id(run_type, started_at);
        let timer = StepTimer::start("scrape");
        let catalog = self.load_catalog().await?;
        let records = self
            .scrape_catalog(driver.as_ref(), &catalog, &session_id, run_type)
            .await;
        timer.finish();

        self.enter(RunPhase::Persisting, run_type);
        let session = RunSession::summarize(session_id, run_type, started_at, Utc::now(), &records);
        self.persist(&session, &records).await?;

        if run_type == RunType::Scheduled {
            self.mark_last_run().await;
        }

        self.log_summary(&catalog, &session);
        self.enter(RunPhase::Done, run_type);

        Ok(RunOutcome::Completed(RunReport { session, records }))
    }

    /// Reads the schedule document and asks the oracle. A missing or
    /// malformed document is a skip, not an error.
    pub async fn decide(&self, now: DateTime<Utc>) -> Result<ScheduleDecision> {
        let config_id = &self.config.schedule.config_id;
        let Some(document) = self.store.get(Collection::ScheduleConfig, config_id).await? else {
            tracing::warn!(config_id = %config_id, "Schedule config not found");
            return Ok(ScheduleDecision::Skip(SkipReason::InvalidConfig(format!(
                "{}/{} not found",
                Collection::ScheduleConfig,
                config_id
            ))));
        };

        let schedule: ScheduleConfig = match serde_json::from_value(document) {
            Ok(schedule) => schedule,
            Err(e) => {
                tracing::warn!(config_id = %config_id, error = %e, "Malformed schedule config");
                return Ok(ScheduleDecision::Skip(SkipReason::InvalidConfig(e.to_string())));
            }
        };

        Ok(oracle::evaluate(&schedule, now, self.config.schedule.window()))
    }

    async fn load_catalog(&self) -> Result<Vec<Product>> {
        let products: Vec<Product> = store::query_typed::<Product>(self.store.as_ref(), Collection::Products, None)
            .await?
            .into_iter()
            .map(|(_, product)| product)
            .filter(|product| !product.sku.trim().is_empty())
            .collect();

        if products.is_empty() {
            tracing::warn!("No products in store, using the built-in sample catalog");
            return Ok(Product::sample_catalog());
        }

        tracing::info!(count = products.len(), "Catalog loaded");
        Ok(products)
    }

    async fn url_mapping(&self, sku: &str) -> UrlMapping {
        match store::get_typed::<UrlMapping>(self.store.as_ref(), Collection::UrlMappings, sku).await {
            Ok(mapping) => mapping.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(sku, error = %e, "Ignoring unreadable URL mapping");
                UrlMapping::default()
            }
        }
    }

    fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            navigation_timeout: self.config.scraper.navigation_timeout(),
            settle_override: self.config.scraper.settle_delay_ms.map(Duration::from_millis),
        }
    }

    async fn scrape_catalog(
        &self,
        driver: &dyn PageDriver,
        catalog: &[Product],
        session_id: &str,
        run_type: RunType,
    ) -> Vec<PriceRecord> {
        let options = self.fetch_options();
        let policy = RetryPolicy::from_config(&self.config.scraper, Some(options.navigation_timeout * 2));
        let mut records = Vec::with_capacity(catalog.len() * self.sites.len());

        for (product_index, product) in catalog.iter().enumerate() {
            let sku = product.sku.trim();
            tracing::info!(sku, product = product.name.as_deref().unwrap_or(""), "Processing product");
            let mapping = self.url_mapping(sku).await;

            for (site_index, site) in self.sites.iter().enumerate() {
                let new = NewPriceRecord {
                    session_id: session_id.to_string(),
                    sku: sku.to_string(),
                    supplier_id: site.site_id().to_string(),
                    supplier_name: site.display_name().to_string(),
                    source_url: String::new(),
                    is_scheduled: run_type == RunType::Scheduled,
                    scraped_at: Utc::now(),
                };

                let record = self
                    .scrape_one(driver, site.as_ref(), &mapping, new, &options, policy)
                    .await;
                tracing::info!(
                    sku,
                    site = site.site_id(),
                    status = %record.status,
                    price = ?record.numeric_price,
                    "Result recorded"
                );
                records.push(record);

                if site_index + 1 < self.sites.len() {
                    pause(self.config.scraper.inter_site_delay()).await;
                }
            }

            if product_index + 1 < catalog.len() {
                pause(self.config.scraper.inter_product_delay()).await;
            }
        }

        records
    }

    /// Never fails: every outcome becomes a classified record.
    async fn scrape_one(
        &self,
        driver: &dyn PageDriver,
        site: &dyn SiteAdapter,
        mapping: &UrlMapping,
        mut new: NewPriceRecord,
        options: &FetchOptions,
        policy: RetryPolicy,
    ) -> PriceRecord {
        let url = match mapping.url_for(site.site_id()) {
            Some(url) => url.to_string(),
            None => match site.build_url(&new.sku) {
                Ok(url) => url,
                Err(e) => {
                    let error = AppError::Scraping {
                        site: site.site_id().to_string(),
                        message: e.to_string(),
                    };
                    return PriceRecord::failed(new, error.to_string());
                }
            },
        };
        new.source_url = url.clone();

        let label = format!("{}:{}", site.site_id(), new.sku);
        let sku = new.sku.clone();
        let (url_ref, sku_ref) = (url.as_str(), sku.as_str());

        let outcome = with_retry(policy, &label, move || site.fetch(driver, url_ref, sku_ref, options)).await;
        new.scraped_at = Utc::now();

        match outcome {
            RetryOutcome::Succeeded { value: raw, attempts } => {
                tracing::debug!(label = %label, attempts, found = raw.found, "Fetch succeeded");
                if raw.found {
                    PriceRecord::found(new, raw.name, raw.price_text, raw.price, raw.brand, raw.category)
                } else {
                    PriceRecord::found(new, None, None, None, None, None)
                }
            }
            RetryOutcome::Exhausted { last_error, .. } => PriceRecord::failed(new, last_error.to_string()),
        }
    }

    async fn persist(&self, session: &RunSession, records: &[PriceRecord]) -> Result<()> {
        let mut ops = Vec::with_capacity(records.len() + self.sites.len() + 1);

        for site in self.sites.iter() {
            let supplier = with_field(store::to_document(&site.supplier())?, "updatedAt", server_timestamp());
            ops.push(WriteOp::merge(Collection::Suppliers, site.site_id(), supplier));
        }

        let session_doc = with_field(store::to_document(session)?, "createdAt", server_timestamp());
        ops.push(WriteOp::set(Collection::ScrapeSessions, session.id.clone(), session_doc));

        for record in records {
            ops.push(WriteOp::set(Collection::PriceData, record.id.clone(), store::to_document(record)?));
        }

        let count = ops.len();
        self.store.batch_write(ops).await?;
        tracing::info!(session_id = %session.id, writes = count, "Run persisted");
        Ok(())
    }

    /// Best effort: a failure here is logged and does not fail the run.
    async fn mark_last_run(&self) {
        let config_id = &self.config.schedule.config_id;
        let fields = serde_json::json!({
            "lastRun": server_timestamp(),
            "updatedAt": server_timestamp(),
        });

        match self.store.update(Collection::ScheduleConfig, config_id, fields).await {
            Ok(()) => tracing::info!(config_id = %config_id, "Schedule lastRun updated"),
            Err(e) => tracing::warn!(config_id = %config_id, error = %e, "Failed to update schedule lastRun"),
        }
    }

    fn log_summary(&self, catalog: &[Product], session: &RunSession) {
        for site in self.sites.iter() {
            let succeeded = session.supplier_success.get(site.site_id()).copied().unwrap_or(0);
            tracing::info!(
                supplier = site.display_name(),
                succeeded,
                products = catalog.len(),
                "Supplier summary"
            );
        }
        tracing::info!(
            session_id = %session.id,
            success = session.success_count,
            total = session.total_results,
            duration_ms = session.duration_ms,
            "Run finished"
        );
    }

    fn enter(&self, phase: RunPhase, run_type: RunType) {
        tracing::info!(phase = %phase, run_type = %run_type, "Run phase");
    }
}

/// Backs `--test`: confirms the store answers and reports what it holds.
pub async fn check_connectivity(store: &dyn Store, config_id: &str) -> Result<ConnectivityReport> {
    store.ping().await?;

    let config_exists = store.get(Collection::ScheduleConfig, config_id).await?.is_some();
    let products_available = !store.query(Collection::Products, Some(1)).await?.is_empty();

    tracing::info!(config_exists, products_available, "Connectivity check passed");
    Ok(ConnectivityReport {
        config_exists,
        products_available,
    })
}

fn with_field(mut document: Document, key: &str, value: Value) -> Document {
    if let Some(fields) = document.as_object_mut() {
        fields.insert(key.to_string(), value);
    }
    document
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
