use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ScraperConfig;
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    /// The main frame fired `load`.
    Load,
    /// The main frame stopped loading and no navigation is pending.
    NetworkIdle,
}

/// The browser primitive the site adapters drive.
///
/// One driver is one page; calls are made strictly one after another.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str, wait: WaitCondition, timeout: Duration) -> Result<()>;

    /// Serialized DOM of the current page.
    async fn content(&self) -> Result<String>;
}

pub struct ChromeDriver {
    // Keeps the Chrome process alive for as long as the tab is used.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeDriver {
    pub async fn launch(config: ScraperConfig) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::launch_blocking(&config))
            .await
            .map_err(|e| AppError::bootstrap(format!("Browser launch task failed: {}", e)))?
    }

    fn launch_blocking(config: &ScraperConfig) -> Result<Self> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(false) // Often needed in containerized environments
            .window_size(Some((config.window_width, config.window_height)))
            .args(vec![
                std::ffi::OsStr::new("--no-sandbox"),
                std::ffi::OsStr::new("--disable-dev-shm-usage"),
                std::ffi::OsStr::new("--disable-gpu"),
            ])
            .build()
            .map_err(|e| AppError::bootstrap(format!("Failed to create launch options: {}", e)))?;

        if let Some(chrome_path) = &config.chrome_path {
            launch_options.path = Some(std::path::PathBuf::from(chrome_path));
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| AppError::bootstrap(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| AppError::bootstrap(format!("Failed to create tab: {}", e)))?;

        tab.set_user_agent(&config.user_agent, None, None)
            .map_err(|e| AppError::bootstrap(format!("Failed to set user agent: {}", e)))?;

        tracing::info!(
            width = config.window_width,
            height = config.window_height,
            "Browser session ready"
        );

        Ok(Self { _browser: browser, tab })
    }
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn navigate(&self, url: &str, wait: WaitCondition, timeout: Duration) -> Result<()> {
        let tab = Arc::clone(&self.tab);
        let target = url.to_string();

        run_bounded(timeout, &format!("Navigation to {}", url), move || {
            // Both blocking calls share one deadline.
            let deadline = Instant::now() + timeout;
            tab.set_default_timeout(timeout);
            tab.navigate_to(&target)
                .map_err(|e| AppError::connection(format!("Navigation failed: {}", e)))?;

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(AppError::connection("Navigation used the whole timeout"));
            }
            tab.set_default_timeout(remaining);

            // headless_chrome only exposes "frame stopped loading"; both
            // conditions map onto it.
            match wait {
                WaitCondition::Load | WaitCondition::NetworkIdle => {
                    tab.wait_until_navigated()
                        .map_err(|e| AppError::connection(format!("Page load failed: {}", e)))?;
                }
            }
            Ok(())
        })
        .await
    }

    async fn content(&self) -> Result<String> {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || {
            tab.get_content()
                .map_err(|e| AppError::connection(format!("Failed to get page content: {}", e)))
        })
        .await
        .map_err(|e| AppError::Internal(format!("Content task failed: {}", e)))?
    }
}

/// Runs a blocking tab call bounded by `timeout`.
///
/// A timed-out call is still awaited before the error is returned, so the
/// tab is idle when the next call (usually a retry) starts.
async fn run_bounded<F>(timeout: Duration, what: &str, call: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    let mut task = tokio::task::spawn_blocking(call);

    match tokio::time::timeout(timeout, &mut task).await {
        Ok(joined) => joined.map_err(|e| AppError::Internal(format!("{} task failed: {}", what, e)))?,
        Err(_) => {
            match task.await {
                Ok(Ok(())) => tracing::debug!(what, "Call finished after its timeout"),
                Ok(Err(e)) => tracing::debug!(what, error = %e, "Call failed after its timeout"),
                Err(e) => tracing::warn!(what, error = %e, "Timed-out task panicked"),
            }
            Err(AppError::connection(format!("{} timed out after {:?}", what, timeout)))
        }
    }
}

/// Parsed DOM of one page, queried with CSS selectors.
pub struct PageSnapshot {
    document: Html,
}

impl PageSnapshot {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }

    pub fn select_all(&self, selector: &str) -> Result<Vec<ElementRef<'_>>> {
        let css_selector = parse_selector(selector)?;
        Ok(self.document.select(&css_selector).collect())
    }
}

pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| AppError::Parse {
        message: format!("Invalid CSS selector '{}': {:?}", selector, e),
    })
}

/// Visible text of an element with whitespace collapsed.
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

pub fn element_attribute(element: ElementRef<'_>, name: &str) -> Option<String> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// First descendant of `element` matching `selector`.
pub fn select_first<'a>(element: ElementRef<'a>, selector: &str) -> Result<Option<ElementRef<'a>>> {
    let css_selector = parse_selector(selector)?;
    Ok(element.select(&css_selector).next())
}
