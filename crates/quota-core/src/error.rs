use crate::limits::Feature;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuotaError {
    #[error("Free limit of {limit} reached for {}", feature.label())]
    LimitExceeded { feature: Feature, limit: u32 },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for QuotaError {
    fn from(e: serde_json::Error) -> Self {
        QuotaError::Serialization(e.to_string())
    }
}
