//! Diagnostic reporting for failed edits
//!
//! Each failure gets a correlation id shown to the user. Entries go to a
//! collector endpoint when one is configured; otherwise, or when the upload
//! fails, they are kept under the `errorLogs` key to be flushed later.

use chrono::{SecondsFormat, Utc};
use quota_core::{write_json, KeyValueStore, QuotaError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const ERROR_LOGS_KEY: &str = "errorLogs";

const ID_SUFFIX_LEN: usize = 7;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// `<epoch-millis>-<7 base36 chars>`
pub fn correlation_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}-{}", Utc::now().timestamp_millis(), suffix)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub message: String,
    pub name: Option<String>,
    /// Source chain, outermost first
    pub stack: Option<String>,
}

impl ErrorDetails {
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        // Variant name from the Debug form, e.g. `OperationError("..")`
        let debug = format!("{:?}", error);
        let name = debug
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }

        Self {
            message: error.to_string(),
            name,
            stack: (!chain.is_empty()).then(|| chain.join("\ncaused by: ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub id: String,
    /// RFC 3339, UTC
    pub timestamp: String,
    pub error: ErrorDetails,
    pub context: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportReceipt {
    pub id: String,
    pub uploaded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    NoEndpoint,
    /// The stored list could not be read; it was left untouched
    Unreadable,
    Flushed { uploaded: usize, remaining: usize },
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("upload failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("collector responded with status {0}")]
    Status(u16),
}

/// Sends one entry to a log collector
pub trait LogUploader: Send + Sync {
    fn upload(&self, entry: &ErrorLogEntry) -> Result<(), UploadError>;
}

/// POSTs entries as JSON
pub struct HttpUploader {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpUploader {
    pub fn new(url: impl Into<String>) -> Result<Self, UploadError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl LogUploader for HttpUploader {
    fn upload(&self, entry: &ErrorLogEntry) -> Result<(), UploadError> {
        let response = self.client.post(&self.url).json(entry).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status(status.as_u16()));
        }
        Ok(())
    }
}

pub struct DiagnosticReporter {
    store: Arc<dyn KeyValueStore>,
    uploader: Option<Box<dyn LogUploader>>,
}

impl DiagnosticReporter {
    /// Reporter that only stores locally
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            uploader: None,
        }
    }

    pub fn with_uploader(mut self, uploader: Box<dyn LogUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn has_endpoint(&self) -> bool {
        self.uploader.is_some()
    }

    /// Record a failure; never fails itself
    pub fn report(
        &self,
        error: &(dyn std::error::Error + 'static),
        context: Value,
    ) -> ReportReceipt {
        let entry = ErrorLogEntry {
            id: correlation_id(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            error: ErrorDetails::from_error(error),
            context,
        };
        let id = entry.id.clone();

        if let Some(uploader) = &self.uploader {
            match uploader.upload(&entry) {
                Ok(()) => {
                    debug!(id = %id, "error report uploaded");
                    return ReportReceipt { id, uploaded: true };
                }
                Err(e) => warn!(id = %id, error = %e, "error report upload failed"),
            }
        }

        match (self.raw_logs(), serde_json::to_value(&entry)) {
            (Ok(mut logs), Ok(value)) => {
                logs.push(value);
                self.store_logs(&logs);
            }
            (Err(e), _) => warn!(id = %id, error = %e, "stored reports unreadable, report not kept"),
            (_, Err(e)) => warn!(id = %id, error = %e, "failed to serialize error report"),
        }

        ReportReceipt {
            id,
            uploaded: false,
        }
    }

    /// Re-send stored entries, keeping the ones that still fail
    ///
    /// Entries that no longer parse are kept as they are.
    pub fn flush(&self) -> FlushOutcome {
        let Some(uploader) = &self.uploader else {
            return FlushOutcome::NoEndpoint;
        };

        let logs = match self.raw_logs() {
            Ok(logs) => logs,
            Err(e) => {
                warn!(error = %e, "stored reports unreadable, nothing flushed");
                return FlushOutcome::Unreadable;
            }
        };
        if logs.is_empty() {
            return FlushOutcome::Flushed {
                uploaded: 0,
                remaining: 0,
            };
        }

        let total = logs.len();
        let remaining: Vec<Value> = logs
            .into_iter()
            .filter(|value| {
                let Ok(entry) = serde_json::from_value::<ErrorLogEntry>(value.clone()) else {
                    return true;
                };
                match uploader.upload(&entry) {
                    Ok(()) => false,
                    Err(e) => {
                        debug!(id = %entry.id, error = %e, "stored report still not uploaded");
                        true
                    }
                }
            })
            .collect();

        self.store_logs(&remaining);
        FlushOutcome::Flushed {
            uploaded: total - remaining.len(),
            remaining: remaining.len(),
        }
    }

    /// Readable entries waiting to be uploaded, oldest first
    pub fn stored(&self) -> Vec<ErrorLogEntry> {
        let logs = match self.raw_logs() {
            Ok(logs) => logs,
            Err(e) => {
                warn!(error = %e, "failed to read stored error reports");
                return Vec::new();
            }
        };

        logs.into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "skipping malformed error report");
                    None
                }
            })
            .collect()
    }

    /// The stored list as raw values, so entries that fail to parse survive rewrites
    fn raw_logs(&self) -> Result<Vec<Value>, QuotaError> {
        match self.store.get(ERROR_LOGS_KEY)? {
            None => Ok(Vec::new()),
            Some(Value::Array(logs)) => Ok(logs),
            Some(_) => Err(QuotaError::Serialization(format!(
                "{} is not a list",
                ERROR_LOGS_KEY
            ))),
        }
    }

    pub fn clear(&self) -> Result<(), QuotaError> {
        write_json(self.store.as_ref(), ERROR_LOGS_KEY, &Vec::<ErrorLogEntry>::new())
    }

    fn store_logs(&self, logs: &[Value]) {
        if let Err(e) = write_json(self.store.as_ref(), ERROR_LOGS_KEY, &logs) {
            warn!(error = %e, "failed to write stored error reports");
        }
    }
}
