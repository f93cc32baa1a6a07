//! Tool sessions for the PDF toolkit
//!
//! Ties the quota gate, the page selection and the edit pipeline together
//! the way each tool screen uses them, and reports failures with a
//! correlation id through the [`diagnostics`] collector.

pub mod diagnostics;
pub mod error;
pub mod selection;
pub mod session;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use diagnostics::{
    correlation_id, DiagnosticReporter, ErrorLogEntry, FlushOutcome, HttpUploader, LogUploader,
    ReportReceipt, ERROR_LOGS_KEY,
};
pub use error::{SelectionError, ToolError};
pub use selection::{PageSelection, SelectAll};
pub use session::{
    BusyFlag, ConversionReport, DocumentSummary, ImagesAdded, JobReport, ToolSession,
};
pub use validation::{validate_pdf, PdfInfo};
