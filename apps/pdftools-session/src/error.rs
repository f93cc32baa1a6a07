use quota_core::{Feature, QuotaError};
use thiserror::Error;

/// Why a page or document selection was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("No pages selected")]
    NoSelection,

    #[error("Cannot delete every page")]
    WouldDeleteAll,

    #[error("Page {page} is out of range (1-{page_count})")]
    OutOfRange { page: u32, page_count: u32 },

    #[error("At least {required} documents are required (got {got})")]
    NotEnoughDocuments { required: usize, got: usize },

    #[error("Free tier allows {cap} at a time")]
    CapReached { cap: usize },

    #[error("{0}")]
    InvalidRange(String),
}

#[derive(Error, Debug)]
pub enum ToolError {
    /// A daily quota or a per-job cap was hit
    #[error("Free limit of {limit} reached for {}", feature.label())]
    LimitExceeded { feature: Feature, limit: u32 },

    #[error("Invalid selection: {0}")]
    InvalidSelection(#[from] SelectionError),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Edit failed (ref {correlation_id}): {source}")]
    EditFailed {
        correlation_id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Another operation is already running")]
    Busy,
}

impl ToolError {
    /// Attribute a selection failure to `feature`; a cap hit becomes
    /// [`ToolError::LimitExceeded`]
    pub fn from_selection(feature: Feature, e: SelectionError) -> Self {
        match e {
            SelectionError::CapReached { cap } => ToolError::LimitExceeded {
                feature,
                limit: u32::try_from(cap).unwrap_or(u32::MAX),
            },
            other => ToolError::InvalidSelection(other),
        }
    }

    /// Short text for the user
    pub fn user_message(&self) -> String {
        match self {
            ToolError::LimitExceeded { feature, limit } => format!(
                "Free users are limited to {} for {}. Upgrade to Pro for unlimited use!",
                limit,
                feature.label()
            ),
            ToolError::InvalidSelection(SelectionError::NoSelection) => {
                "Please select at least one page.".to_string()
            }
            ToolError::InvalidSelection(SelectionError::WouldDeleteAll) => {
                "You cannot delete all pages. At least one page must remain.".to_string()
            }
            ToolError::InvalidSelection(SelectionError::OutOfRange { page, page_count }) => {
                format!("Page {} is out of range (1-{}).", page, page_count)
            }
            ToolError::InvalidSelection(SelectionError::NotEnoughDocuments { required, .. }) => {
                format!("Please add at least {} PDFs.", required)
            }
            ToolError::InvalidSelection(SelectionError::CapReached { cap }) => format!(
                "Free users can only select {} at a time. Upgrade to Pro!",
                cap
            ),
            ToolError::InvalidSelection(SelectionError::InvalidRange(message)) => {
                format!("Invalid page range: {}", message)
            }
            ToolError::SourceUnavailable(message) => message.clone(),
            ToolError::EditFailed { correlation_id, .. } => format!(
                "Something went wrong while editing PDF. Ref: {}",
                correlation_id
            ),
            ToolError::StorageUnavailable(_) => {
                "Your usage could not be saved.".to_string()
            }
            ToolError::Busy => "Please wait for the current operation to finish.".to_string(),
        }
    }
}

impl From<QuotaError> for ToolError {
    fn from(e: QuotaError) -> Self {
        match e {
            QuotaError::LimitExceeded { feature, limit } => {
                ToolError::LimitExceeded { feature, limit }
            }
            QuotaError::StorageUnavailable(msg) | QuotaError::Serialization(msg) => {
                ToolError::StorageUnavailable(msg)
            }
        }
    }
}
