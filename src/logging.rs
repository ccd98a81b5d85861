//! Tracing subscriber setup for the CLI.
//!
//! Console output always goes through `tracing-subscriber`'s fmt layer. When
//! a log directory is configured, a daily rolling file sink is added; the
//! returned guard must stay alive until the process exits or buffered lines
//! are lost.

use std::time::Instant;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

const DEFAULT_DIRECTIVE: &str = "smart_price_scraper=info";

pub fn init(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "smart-price-scraper.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .try_init()?;

            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .try_init()?;

            Ok(None)
        }
    }
}

/// Logs how long a named step took once it is finished.
#[derive(Debug)]
pub struct StepTimer {
    step: &'static str,
    start: Instant,
}

impl StepTimer {
    #[must_use]
    pub fn start(step: &'static str) -> Self {
        tracing::debug!(step, "Step started");
        Self {
            step,
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn finish(self) -> u64 {
        let duration_ms = self.elapsed_ms();
        tracing::info!(step = self.step, duration_ms, "Step completed");
        duration_ms
    }
}
