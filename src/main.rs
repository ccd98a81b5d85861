use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use smart_price_scraper::browser::{ChromeDriver, PageDriver};
use smart_price_scraper::models::RunType;
use smart_price_scraper::orchestrator::check_connectivity;
use smart_price_scraper::sites::SiteRegistry;
use smart_price_scraper::store::{SqliteStore, Store};
use smart_price_scraper::{AppConfig, AppError, RunOrchestrator, RunOutcome, logging};

/// Collects prices for the catalog from every configured storefront.
#[derive(Debug, Parser)]
#[command(name = "smart-price-scraper", version, about)]
struct Cli {
    /// Only run if the stored schedule says a slot is due now
    #[arg(long)]
    decide: bool,

    /// Run now, ignoring the schedule
    #[arg(long)]
    manual: bool,

    /// Check store connectivity and exit without scraping; wins over the other flags
    #[arg(long)]
    test: bool,

    /// Directory holding default/{RUN_MODE}/local config files
    #[arg(long, default_value = "config")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Held until exit so the file writer flushes.
    let _guard = match logging::init(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    info!("Starting Smart Price Scraper...");

    let store = connect_store(&config).await?;

    if cli.test {
        let report = check_connectivity(store.as_ref(), &config.schedule.config_id).await?;
        info!(
            config_exists = report.config_exists,
            products_available = report.products_available,
            "Connectivity OK"
        );
        return Ok(());
    }

    let forced = std::env::var("FORCE_SCRAPE").is_ok_and(|value| value == "true");
    let run_type = RunType::select(forced, cli.manual, cli.decide);
    info!(run_type = %run_type, "Mode selected");

    let scraper_config = config.scraper.clone();
    let orchestrator = RunOrchestrator::new(store, SiteRegistry::standard(), config);

    let outcome = orchestrator
        .execute(run_type, chrono::Utc::now(), || async move {
            let driver = ChromeDriver::launch(scraper_config).await?;
            Ok::<_, AppError>(Arc::new(driver) as Arc<dyn PageDriver>)
        })
        .await
        .context("Run failed")?;

    match outcome {
        RunOutcome::Skipped { reason, .. } => info!(reason = %reason, "Nothing to do"),
        RunOutcome::Completed(report) => info!(
            session_id = %report.session.id,
            records = report.records.len(),
            success = report.session.success_count,
            "Done"
        ),
    }

    Ok(())
}

async fn connect_store(config: &AppConfig) -> Result<Arc<dyn Store>, AppError> {
    let store = SqliteStore::connect(&config.store)
        .await
        .map_err(|e| AppError::bootstrap(format!("Store unavailable: {}", e)))?;

    store
        .ping()
        .await
        .map_err(|e| AppError::bootstrap(e.to_string()))?;

    Ok(Arc::new(store))
}
