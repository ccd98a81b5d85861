use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use validator::{Validate, ValidationError};

use crate::models::Frequency;
use crate::utils::error::{AppError, Result};

static START_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2}):(\d{2})$").expect("static regex"));
static OFFSET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([+-])(\d{2}):?(\d{2})$").expect("static regex"));

pub const DEFAULT_TIMEZONE: &str = "+07:00";

/// The `scheduleConfig` document as it is stored.
///
/// Fields stay loosely typed because the document is written by the
/// management API; [`ScheduleConfig::resolve`] turns it into a checked
/// [`ResolvedSchedule`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    pub frequency: Option<String>,
    /// Local wall-clock time, `HH:mm`.
    pub start_time: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSchedule {
    pub frequency: Frequency,
    pub start_time: NaiveTime,
    pub offset: FixedOffset,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleUpdate {
    #[validate(custom(function = "validate_frequency"))]
    pub frequency: String,
    #[validate(custom(function = "validate_start_time"))]
    pub start_time: String,
    pub timezone: Option<String>,
}

impl ScheduleConfig {
    /// What the management API reports before anything was saved.
    pub fn initial() -> Self {
        Self {
            frequency: Some("24h".to_string()),
            start_time: Some("09:00".to_string()),
            is_active: false,
            last_run: None,
            timezone: Some(DEFAULT_TIMEZONE.to_string()),
            updated_at: None,
        }
    }

    pub fn resolve(&self) -> Result<ResolvedSchedule> {
        let frequency = self
            .frequency
            .as_deref()
            .ok_or_else(|| AppError::config("Schedule frequency is missing"))?
            .parse::<Frequency>()?;

        let start_time = parse_start_time(
            self.start_time
                .as_deref()
                .ok_or_else(|| AppError::config("Schedule startTime is missing"))?,
        )?;

        let offset = parse_timezone(self.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE))?;

        Ok(ResolvedSchedule {
            frequency,
            start_time,
            offset,
        })
    }

    /// Saves a schedule edit. Every edit activates the schedule and clears
    /// `last_run` so the next window is honoured immediately.
    pub fn apply(&mut self, update: ScheduleUpdate, now: DateTime<Utc>) -> Result<()> {
        update.validate()?;
        let timezone = update.timezone.unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        parse_timezone(&timezone)?;

        self.frequency = Some(update.frequency);
        self.start_time = Some(update.start_time);
        self.timezone = Some(timezone);
        self.is_active = true;
        self.last_run = None;
        self.updated_at = Some(now);
        Ok(())
    }
}

pub fn parse_start_time(value: &str) -> Result<NaiveTime> {
    let captures = START_TIME_RE
        .captures(value.trim())
        .ok_or_else(|| AppError::config(format!("Invalid start time format (HH:mm): {}", value)))?;

    let hour: u32 = captures[1].parse().map_err(|_| AppError::config("Invalid hour"))?;
    let minute: u32 = captures[2].parse().map_err(|_| AppError::config("Invalid minute"))?;

    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| AppError::config(format!("Start time out of range: {}", value)))
}

pub fn parse_timezone(value: &str) -> Result<FixedOffset> {
    match value.trim() {
        "UTC" | "Z" => return parse_timezone("+00:00"),
        "Asia/Ho_Chi_Minh" | "Asia/Saigon" => return parse_timezone(DEFAULT_TIMEZONE),
        _ => {}
    }

    let captures = OFFSET_RE
        .captures(value.trim())
        .ok_or_else(|| AppError::config(format!("Unsupported timezone: {}", value)))?;

    let hours: i32 = captures[2].parse().map_err(|_| AppError::config("Invalid offset hours"))?;
    let minutes: i32 = captures[3].parse().map_err(|_| AppError::config("Invalid offset minutes"))?;
    let seconds = (hours * 3600 + minutes * 60) * if &captures[1] == "-" { -1 } else { 1 };

    FixedOffset::east_opt(seconds)
        .ok_or_else(|| AppError::config(format!("Timezone offset out of range: {}", value)))
}

fn validate_frequency(value: &str) -> std::result::Result<(), ValidationError> {
    value
        .parse::<Frequency>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("frequency"))
}

fn validate_start_time(value: &str) -> std::result::Result<(), ValidationError> {
    parse_start_time(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new("start_time"))
}
