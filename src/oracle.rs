//! Decides whether a stateless invocation should start a scheduled run.
//!
//! Everything here is pure: the answer depends only on the stored
//! [`ScheduleConfig`] and the `now` passed in, so independent processes
//! reading the same document agree on the outcome.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fmt;

use crate::models::{ResolvedSchedule, ScheduleConfig};

/// Slightly wider than the external trigger's polling interval so a window
/// is never skipped between two polls.
pub const DEFAULT_WINDOW_MINUTES: i64 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Inactive,
    InvalidConfig(String),
    TooEarly {
        next_run: DateTime<Utc>,
        wait: Duration,
    },
    /// Half-cycle guard.
    AlreadyRan {
        last_run: DateTime<Utc>,
        since: Duration,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleDecision {
    Run { next_run: DateTime<Utc> },
    Skip(SkipReason),
}

impl ScheduleDecision {
    pub fn should_run(&self) -> bool {
        matches!(self, ScheduleDecision::Run { .. })
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Inactive => write!(f, "schedule is inactive"),
            SkipReason::InvalidConfig(message) => write!(f, "invalid schedule: {}", message),
            SkipReason::TooEarly { next_run, wait } => write!(
                f,
                "next run at {} ({} min away)",
                next_run.to_rfc3339(),
                wait.num_minutes()
            ),
            SkipReason::AlreadyRan { last_run, since } => write!(
                f,
                "already ran at {} ({} min ago)",
                last_run.to_rfc3339(),
                since.num_minutes()
            ),
        }
    }
}

impl fmt::Display for ScheduleDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleDecision::Run { next_run } => write!(f, "run (slot {})", next_run.to_rfc3339()),
            ScheduleDecision::Skip(reason) => write!(f, "skip: {}", reason),
        }
    }
}

pub fn default_window() -> Duration {
    Duration::minutes(DEFAULT_WINDOW_MINUTES)
}

/// `evaluate` with the default execution window.
pub fn should_run(config: &ScheduleConfig, now: DateTime<Utc>) -> bool {
    evaluate(config, now, default_window()).should_run()
}

pub fn evaluate(config: &ScheduleConfig, now: DateTime<Utc>, window: Duration) -> ScheduleDecision {
    if !config.is_active {
        return ScheduleDecision::Skip(SkipReason::Inactive);
    }

    let schedule = match config.resolve() {
        Ok(schedule) => schedule,
        Err(e) => return ScheduleDecision::Skip(SkipReason::InvalidConfig(e.to_string())),
    };

    let next_run = next_scheduled(&schedule, now);
    let wait = next_run - now;
    if wait > window {
        return ScheduleDecision::Skip(SkipReason::TooEarly { next_run, wait });
    }

    if let Some(last_run) = config.last_run {
        let since = now - last_run;
        if since < schedule.frequency.half_period() {
            return ScheduleDecision::Skip(SkipReason::AlreadyRan { last_run, since });
        }
    }

    ScheduleDecision::Run { next_run }
}

/// First slot `>= now` on the grid anchored at today's local start time and
/// spaced by the frequency.
pub fn next_scheduled(schedule: &ResolvedSchedule, now: DateTime<Utc>) -> DateTime<Utc> {
    let local_today = now.with_timezone(&schedule.offset).date_naive();
    let anchor_local = local_today.and_time(schedule.start_time);
    // A fixed offset maps every local time to exactly one instant.
    let anchor = schedule
        .offset
        .from_local_datetime(&anchor_local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&anchor_local));

    let period = schedule.frequency.period();
    let period_ms = period.num_milliseconds();
    let elapsed_ms = (now - anchor).num_milliseconds();

    // ceil(elapsed / period); negative when today's anchor is still ahead.
    let cycles = elapsed_ms.div_euclid(period_ms) + i64::from(elapsed_ms.rem_euclid(period_ms) != 0);
    let mut next = anchor + Duration::milliseconds(period_ms * cycles);

    // Sub-millisecond remainder of `now`.
    if next < now {
        next += period;
    }
    next
}
