//! Usage ledger
//!
//! Holds today's usage record and the pro flag in memory and mirrors every
//! change to the store. A change is applied in memory only after the store
//! accepted it, so a failed write leaves the ledger as it was.

use crate::error::QuotaError;
use crate::limits::Feature;
use crate::record::{reconcile, UsageRecord};
use crate::store::{read_json, write_json, KeyValueStore};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const USAGE_KEY: &str = "usage";
pub const PRO_KEY: &str = "pro";

/// Reported by [`UsageLedger::remaining`] for pro users
pub const UNLIMITED: i64 = -1;

pub struct UsageLedger {
    store: Arc<dyn KeyValueStore>,
    usage: UsageRecord,
    is_pro: bool,
    today: NaiveDate,
}

impl UsageLedger {
    /// Restore the ledger from `store`
    ///
    /// A record from an earlier day is replaced by a zeroed one, which is
    /// written back. Unreadable state falls back to defaults with a warning.
    pub fn load(store: Arc<dyn KeyValueStore>, today: NaiveDate) -> Self {
        let is_pro = match read_json::<bool>(store.as_ref(), PRO_KEY) {
            Ok(value) => value.unwrap_or(false),
            Err(e) => {
                warn!(error = %e, "could not load pro flag, assuming free tier");
                false
            }
        };

        let usage = match read_json::<UsageRecord>(store.as_ref(), USAGE_KEY) {
            Ok(Some(saved)) if saved.is_current(today) => saved,
            Ok(Some(saved)) => {
                let fresh = reconcile(saved, today);
                if let Err(e) = write_json(store.as_ref(), USAGE_KEY, &fresh) {
                    warn!(error = %e, "could not persist daily usage reset");
                }
                debug!(date = fresh.last_reset_date(), "usage reset for new day");
                fresh
            }
            Ok(None) => UsageRecord::new(today),
            Err(e) => {
                warn!(error = %e, "could not load usage, starting from zero");
                UsageRecord::new(today)
            }
        };

        Self {
            store,
            usage,
            is_pro,
            today,
        }
    }

    pub fn is_pro(&self) -> bool {
        self.is_pro
    }

    pub fn usage(&self) -> &UsageRecord {
        &self.usage
    }

    pub fn count(&self, feature: Feature) -> u32 {
        self.usage.count(feature)
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn check_limit(&self, feature: Feature) -> bool {
        self.is_pro || self.count(feature) < feature.limit()
    }

    /// Uses left today, or [`UNLIMITED`] for pro
    pub fn remaining(&self, feature: Feature) -> i64 {
        if self.is_pro {
            return UNLIMITED;
        }
        (feature.limit() as i64 - self.count(feature) as i64).max(0)
    }

    /// Record one use of `feature`; a no-op for pro
    pub fn increment(&mut self, feature: Feature) -> Result<(), QuotaError> {
        if self.is_pro {
            return Ok(());
        }

        let next = self.usage.incremented(feature);
        write_json(self.store.as_ref(), USAGE_KEY, &next)?;
        self.usage = next;

        debug!(feature = %feature, count = self.count(feature), "usage incremented");
        Ok(())
    }

    pub fn set_pro(&mut self, value: bool) -> Result<(), QuotaError> {
        write_json(self.store.as_ref(), PRO_KEY, &value)?;
        self.is_pro = value;
        info!(pro = value, "entitlement changed");
        Ok(())
    }

    /// Zero every counter for today
    pub fn reset(&mut self) -> Result<(), QuotaError> {
        let fresh = UsageRecord::new(self.today);
        write_json(self.store.as_ref(), USAGE_KEY, &fresh)?;
        self.usage = fresh;
        info!("usage reset");
        Ok(())
    }

    /// Move a long-lived ledger to `today`, resetting counters if the day
    /// changed. Returns whether a reset happened.
    ///
    /// Like [`UsageLedger::load`], the reset takes effect in memory even if
    /// it cannot be persisted.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        self.today = today;
        if self.usage.is_current(today) {
            return false;
        }

        let fresh = reconcile(self.usage.clone(), today);
        if let Err(e) = write_json(self.store.as_ref(), USAGE_KEY, &fresh) {
            warn!(error = %e, "could not persist daily usage reset");
        }
        self.usage = fresh;
        debug!(date = self.usage.last_reset_date(), "usage rolled over");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::date_string;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn fresh_ledger() -> (Arc<MemoryStore>, UsageLedger) {
        let store = Arc::new(MemoryStore::new());
        let ledger = UsageLedger::load(store.clone(), day(19));
        (store, ledger)
    }

    #[test]
    fn test_empty_store_defaults() {
        let (_, ledger) = fresh_ledger();
        assert!(!ledger.is_pro());
        assert_eq!(ledger.remaining(Feature::MergePdfs), 2);
        assert_eq!(ledger.usage().last_reset_date(), "Mon Oct 19 2026");
    }

    #[test]
    fn test_check_limit_until_exhausted() {
        let (_, mut ledger) = fresh_ledger();
        for _ in 0..Feature::CompressPdf.limit() {
            assert!(ledger.check_limit(Feature::CompressPdf));
            ledger.increment(Feature::CompressPdf).unwrap();
        }
        assert!(!ledger.check_limit(Feature::CompressPdf));
        assert_eq!(ledger.remaining(Feature::CompressPdf), 0);
        assert!(ledger.check_limit(Feature::RotatePdf));
    }

    #[test]
    fn test_increment_persists_record() {
        let (store, mut ledger) = fresh_ledger();
        ledger.increment(Feature::SplitPdfPages).unwrap();
        let saved: UsageRecord = read_json(store.as_ref(), USAGE_KEY).unwrap().unwrap();
        assert_eq!(saved.count(Feature::SplitPdfPages), 1);
    }

    #[test]
    fn test_failed_write_leaves_snapshot_unchanged() {
        let (store, mut ledger) = fresh_ledger();
        store.set_unavailable(true);
        assert!(matches!(
            ledger.increment(Feature::MergePdfs),
            Err(QuotaError::StorageUnavailable(_))
        ));
        assert_eq!(ledger.count(Feature::MergePdfs), 0);

        assert!(ledger.set_pro(true).is_err());
        assert!(!ledger.is_pro());
    }

    #[test]
    fn test_pro_is_unlimited_and_not_counted() {
        let (_, mut ledger) = fresh_ledger();
        ledger.set_pro(true).unwrap();
        for _ in 0..10 {
            ledger.increment(Feature::MergePdfs).unwrap();
        }
        assert!(ledger.check_limit(Feature::MergePdfs));
        assert_eq!(ledger.remaining(Feature::MergePdfs), UNLIMITED);
        assert_eq!(ledger.count(Feature::MergePdfs), 0);
    }

    #[test]
    fn test_pro_flag_survives_reload() {
        let (store, mut ledger) = fresh_ledger();
        ledger.set_pro(true).unwrap();
        let reloaded = UsageLedger::load(store, day(19));
        assert!(reloaded.is_pro());
    }

    #[test]
    fn test_load_resets_stale_record_and_persists() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(
                USAGE_KEY,
                json!({"mergePdfs": 2, "splitPdf": 4, "lastResetDate": date_string(day(18))}),
            )
            .unwrap();

        let ledger = UsageLedger::load(store.clone(), day(19));
        assert_eq!(ledger.count(Feature::MergePdfs), 0);

        let saved: UsageRecord = read_json(store.as_ref(), USAGE_KEY).unwrap().unwrap();
        assert_eq!(saved, UsageRecord::new(day(19)));
    }

    #[test]
    fn test_load_same_day_keeps_counts() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(
                USAGE_KEY,
                json!({"mergePdfs": 2, "lastResetDate": date_string(day(19))}),
            )
            .unwrap();

        let ledger = UsageLedger::load(store, day(19));
        assert_eq!(ledger.count(Feature::MergePdfs), 2);
        assert!(!ledger.check_limit(Feature::MergePdfs));
    }

    #[test]
    fn test_load_corrupt_usage_falls_back() {
        let store = Arc::new(MemoryStore::new());
        store.set(USAGE_KEY, json!("garbage")).unwrap();
        store.set(PRO_KEY, json!({"nested": true})).unwrap();

        let ledger = UsageLedger::load(store, day(19));
        assert!(!ledger.is_pro());
        assert_eq!(ledger.usage(), &UsageRecord::new(day(19)));
    }

    #[test]
    fn test_load_with_unavailable_store() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        let ledger = UsageLedger::load(store, day(19));
        assert_eq!(ledger.remaining(Feature::ImagesToPdf), 5);
    }

    #[test]
    fn test_roll_over_resets_once() {
        let (_, mut ledger) = fresh_ledger();
        ledger.increment(Feature::RotatePdf).unwrap();

        assert!(!ledger.roll_over(day(19)));
        assert_eq!(ledger.count(Feature::RotatePdf), 1);

        assert!(ledger.roll_over(day(20)));
        assert!(!ledger.roll_over(day(20)));
        assert_eq!(ledger.count(Feature::RotatePdf), 0);
    }

    #[test]
    fn test_reset_zeroes_counts() {
        let (_, mut ledger) = fresh_ledger();
        ledger.increment(Feature::DeletePages).unwrap();
        ledger.reset().unwrap();
        assert_eq!(ledger.count(Feature::DeletePages), 0);
    }
}
