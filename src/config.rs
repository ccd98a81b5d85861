use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub scraper: ScraperConfig,
    pub schedule: ScheduleSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// Per-navigation timeout in seconds.
    pub request_timeout: u64,
    /// Overrides every site's own settle delay when set.
    pub settle_delay_ms: Option<u64>,
    pub inter_site_delay_ms: u64,
    pub inter_product_delay_ms: u64,
    pub user_agent: String,
    pub chrome_path: Option<String>,
    pub window_width: u32,
    pub window_height: u32,
    pub headless: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub window_minutes: i64,
    pub config_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/prices.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay_ms: 5000,
            request_timeout: 30,
            settle_delay_ms: None,
            inter_site_delay_ms: 2000,
            inter_product_delay_ms: 5000,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            chrome_path: None,
            window_width: 1920,
            window_height: 1080,
            headless: true,
        }
    }
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            window_minutes: 16,
            config_id: "main".to_string(),
        }
    }
}

impl ScraperConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn inter_site_delay(&self) -> Duration {
        Duration::from_millis(self.inter_site_delay_ms)
    }

    pub fn inter_product_delay(&self) -> Duration {
        Duration::from_millis(self.inter_product_delay_ms)
    }
}

impl ScheduleSettings {
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.window_minutes)
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Path::new("config"))
    }

    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let file = |name: &str| File::with_name(&config_dir.join(name).to_string_lossy()).required(false);

        let s = Config::builder()
            .add_source(file("default"))
            .add_source(file(&run_mode))
            // Local overrides, ignored by git
            .add_source(file("local"))
            .add_source(Environment::with_prefix("PRICE_SCRAPER").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        if config.scraper.chrome_path.is_none() {
            config.scraper.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.store.url.starts_with("sqlite:") {
            return Err(ConfigError::Message("Store url must be a sqlite: URL".into()));
        }

        if self.store.max_connections == 0 {
            return Err(ConfigError::Message("Store max_connections must be greater than 0".into()));
        }

        if self.scraper.retry_attempts == 0 {
            return Err(ConfigError::Message("Scraper retry_attempts must be greater than 0".into()));
        }

        if !(30..=60).contains(&self.scraper.request_timeout) {
            return Err(ConfigError::Message(
                "Scraper request_timeout must be between 30 and 60 seconds".into(),
            ));
        }

        if self.scraper.user_agent.trim().is_empty() {
            return Err(ConfigError::Message("Scraper user_agent must not be empty".into()));
        }

        if self.scraper.window_width == 0 || self.scraper.window_height == 0 {
            return Err(ConfigError::Message("Scraper window size must be non-zero".into()));
        }

        if self.schedule.window_minutes <= 0 {
            return Err(ConfigError::Message("Schedule window_minutes must be greater than 0".into()));
        }

        if self.schedule.config_id.trim().is_empty() {
            return Err(ConfigError::Message("Schedule config_id must not be empty".into()));
        }

        Ok(())
    }
}
