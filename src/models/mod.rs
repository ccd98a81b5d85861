use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::utils::error::AppError;

pub mod price_record;
pub mod product;
pub mod run_session;
pub mod schedule_config;
pub mod supplier;

// Re-exports for convenience
pub use price_record::*;
pub use product::*;
pub use run_session::*;
pub use schedule_config::*;
pub use supplier::*;

pub const CURRENCY_VND: &str = "VND";

/// Canonical outcome vocabulary for one (product, site) lookup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeStatus {
    FoundWithPrice,
    FoundNoPrice,
    NoInfo,
    Error,
}

impl ScrapeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeStatus::FoundWithPrice => "found_with_price",
            ScrapeStatus::FoundNoPrice => "found_no_price",
            ScrapeStatus::NoInfo => "no_info",
            ScrapeStatus::Error => "error",
        }
    }

    pub fn is_success(&self) -> bool {
        *self == ScrapeStatus::FoundWithPrice
    }

    /// Maps the localized labels older records were written with.
    pub fn from_legacy_label(label: &str, has_price: bool) -> Option<Self> {
        match label.trim() {
            "Còn hàng" if has_price => Some(ScrapeStatus::FoundWithPrice),
            "Còn hàng" => Some(ScrapeStatus::FoundNoPrice),
            "Không tìm thấy" => Some(ScrapeStatus::NoInfo),
            "Lỗi kết nối" => Some(ScrapeStatus::Error),
            other => serde_json::from_value(serde_json::Value::String(other.to_string())).ok(),
        }
    }
}

impl fmt::Display for ScrapeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    Manual,
    Forced,
    Scheduled,
    Default,
}

impl RunType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunType::Manual => "manual",
            RunType::Forced => "forced",
            RunType::Scheduled => "scheduled",
            RunType::Default => "default",
        }
    }

    /// Forced beats manual, manual beats decide, otherwise the default run.
    pub fn select(force_env: bool, manual: bool, decide: bool) -> Self {
        if force_env {
            RunType::Forced
        } else if manual {
            RunType::Manual
        } else if decide {
            RunType::Scheduled
        } else {
            RunType::Default
        }
    }

    pub fn consults_oracle(&self) -> bool {
        *self == RunType::Scheduled
    }
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Frequency {
    #[serde(rename = "1h")]
    Hourly,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "24h")]
    Daily,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Hourly => "1h",
            Frequency::SixHours => "6h",
            Frequency::TwelveHours => "12h",
            Frequency::Daily => "24h",
        }
    }

    pub fn period(&self) -> chrono::Duration {
        let hours = match self {
            Frequency::Hourly => 1,
            Frequency::SixHours => 6,
            Frequency::TwelveHours => 12,
            Frequency::Daily => 24,
        };
        chrono::Duration::hours(hours)
    }

    pub fn half_period(&self) -> chrono::Duration {
        self.period() / 2
    }
}

impl FromStr for Frequency {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1h" => Ok(Frequency::Hourly),
            "6h" => Ok(Frequency::SixHours),
            "12h" => Ok(Frequency::TwelveHours),
            "24h" => Ok(Frequency::Daily),
            other => Err(AppError::config(format!("Invalid frequency: {}", other))),
        }
    }
}

pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
