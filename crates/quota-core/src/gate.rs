//! Entitlement gate: "may the user do this, and how much of it"

use crate::error::QuotaError;
use crate::ledger::UsageLedger;
use crate::limits::Feature;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type SharedLedger = Arc<Mutex<UsageLedger>>;

/// One row of a usage summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureUsage {
    pub feature: Feature,
    pub used: u32,
    pub limit: u32,
    /// -1 for pro
    pub remaining: i64,
}

/// Read-through view over a shared ledger
///
/// Each call takes the ledger lock for its own duration only. A check
/// followed by a `record_use` is not atomic.
#[derive(Clone)]
pub struct EntitlementGate {
    ledger: SharedLedger,
}

impl EntitlementGate {
    pub fn new(ledger: UsageLedger) -> Self {
        Self::from_shared(Arc::new(Mutex::new(ledger)))
    }

    pub fn from_shared(ledger: SharedLedger) -> Self {
        Self { ledger }
    }

    pub fn shared(&self) -> SharedLedger {
        Arc::clone(&self.ledger)
    }

    fn ledger(&self) -> MutexGuard<'_, UsageLedger> {
        // Ledger state is replaced wholesale on each write, so a poisoned
        // lock still guards a consistent value
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_pro(&self) -> bool {
        self.ledger().is_pro()
    }

    pub fn check_limit(&self, feature: Feature) -> bool {
        self.ledger().check_limit(feature)
    }

    pub fn remaining(&self, feature: Feature) -> i64 {
        self.ledger().remaining(feature)
    }

    pub fn ensure_allowed(&self, feature: Feature) -> Result<(), QuotaError> {
        if self.check_limit(feature) {
            Ok(())
        } else {
            Err(QuotaError::LimitExceeded {
                feature,
                limit: feature.limit(),
            })
        }
    }

    /// Largest job size allowed for `feature`; `None` for pro
    pub fn per_job_cap(&self, feature: Feature) -> Option<usize> {
        if self.is_pro() {
            None
        } else {
            Some(feature.limit() as usize)
        }
    }

    pub fn record_use(&self, feature: Feature) -> Result<(), QuotaError> {
        self.ledger().increment(feature)
    }

    pub fn set_pro(&self, value: bool) -> Result<(), QuotaError> {
        self.ledger().set_pro(value)
    }

    pub fn reset(&self) -> Result<(), QuotaError> {
        self.ledger().reset()
    }

    pub fn roll_over(&self, today: NaiveDate) -> bool {
        self.ledger().roll_over(today)
    }

    pub fn summary(&self) -> Vec<FeatureUsage> {
        let ledger = self.ledger();
        Feature::ALL
            .iter()
            .map(|&feature| FeatureUsage {
                feature,
                used: ledger.count(feature),
                limit: feature.limit(),
                remaining: ledger.remaining(feature),
            })
            .collect()
    }
}
