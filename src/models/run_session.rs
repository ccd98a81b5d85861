use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{PriceRecord, RunType};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub total_results: u32,
    pub success_count: u32,
    pub run_type: RunType,
    pub duration_ms: u64,
    /// supplier id -> records with a price
    pub supplier_success: BTreeMap<String, u32>,
}

impl RunSession {
    pub fn session_id(run_type: RunType, started_at: DateTime<Utc>) -> String {
        format!("session_{}_{}", started_at.timestamp_millis(), run_type)
    }

    /// Counts are derived from the records so `success_count <= total_results`
    /// always holds.
    pub fn summarize(
        id: String,
        run_type: RunType,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        records: &[PriceRecord],
    ) -> Self {
        let mut supplier_success = BTreeMap::new();
        for record in records {
            let entry = supplier_success.entry(record.supplier_id.clone()).or_insert(0);
            if record.status.is_success() {
                *entry += 1;
            }
        }

        Self {
            id,
            started_at,
            ended_at,
            total_results: records.len() as u32,
            success_count: records.iter().filter(|r| r.status.is_success()).count() as u32,
            run_type,
            duration_ms: (ended_at - started_at).num_milliseconds().max(0) as u64,
            supplier_success,
        }
    }
}
