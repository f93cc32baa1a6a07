//! Per-day usage counters

use crate::limits::Feature;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Format of `lastResetDate`, e.g. `Mon Oct 19 2026`
const DATE_FORMAT: &str = "%a %b %d %Y";

/// Render a calendar date the way usage records store it
pub fn date_string(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Feature counters plus the day they were last reset
///
/// Serialized flat: one camelCase key per counter next to `lastResetDate`.
/// Counters that are absent read as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    #[serde(flatten)]
    counts: BTreeMap<String, u32>,
    #[serde(default)]
    last_reset_date: String,
}

impl UsageRecord {
    /// All counters at zero, reset on `today`
    pub fn new(today: NaiveDate) -> Self {
        Self {
            counts: Feature::ALL
                .iter()
                .map(|f| (f.counter_key().to_string(), 0))
                .collect(),
            last_reset_date: date_string(today),
        }
    }

    pub fn count(&self, feature: Feature) -> u32 {
        self.counts
            .get(feature.counter_key())
            .copied()
            .unwrap_or(0)
    }

    pub fn last_reset_date(&self) -> &str {
        &self.last_reset_date
    }

    /// Copy of this record with `feature` bumped by one
    pub fn incremented(&self, feature: Feature) -> Self {
        let mut next = self.clone();
        let count = next
            .counts
            .entry(feature.counter_key().to_string())
            .or_insert(0);
        *count = count.saturating_add(1);
        next
    }

    pub fn is_current(&self, today: NaiveDate) -> bool {
        self.last_reset_date == date_string(today)
    }
}

/// Bring a record up to `today`: unchanged if it was reset today, otherwise
/// a fresh zeroed record
pub fn reconcile(record: UsageRecord, today: NaiveDate) -> UsageRecord {
    if record.is_current(today) {
        record
    } else {
        UsageRecord::new(today)
    }
}
