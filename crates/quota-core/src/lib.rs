//! Freemium quota accounting
//!
//! A [`UsageLedger`] keeps per-feature daily counters and the pro flag in a
//! [`KeyValueStore`]; an [`EntitlementGate`] answers whether an operation is
//! allowed. Counters reset on the first access of each calendar day.

pub mod error;
pub mod gate;
pub mod ledger;
pub mod limits;
pub mod record;
pub mod store;
pub mod theme;

pub use error::QuotaError;
pub use gate::{EntitlementGate, FeatureUsage, SharedLedger};
pub use ledger::{UsageLedger, PRO_KEY, UNLIMITED, USAGE_KEY};
pub use limits::{Feature, PRO_FEATURES};
pub use record::{date_string, reconcile, UsageRecord};
pub use store::{read_json, write_json, JsonFileStore, KeyValueStore, MemoryStore};
pub use theme::{ThemePreference, THEME_KEY};
