//! PDF validation and info extraction
//!
//! Checks an input before a tool accepts it, so bad files are rejected
//! up front as unavailable sources instead of failing mid-edit.

use crate::error::ToolError;
use lopdf::Document;
use serde::Serialize;

/// PDF file information extracted during validation
#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct PdfInfo {
    pub page_count: u32,
    /// PDF version string (e.g., "1.7")
    pub version: String,
    pub encrypted: bool,
    pub size_bytes: usize,
    /// Document title from metadata (if available)
    pub title: Option<String>,
}

fn unavailable(message: impl Into<String>) -> ToolError {
    ToolError::SourceUnavailable(message.into())
}

/// Validate a PDF file and extract basic info
pub fn validate_pdf(bytes: &[u8]) -> Result<PdfInfo, ToolError> {
    if bytes.len() < 8 {
        return Err(unavailable("File too small to be a valid PDF"));
    }

    if !bytes.starts_with(b"%PDF-") {
        return Err(unavailable("Not a valid PDF file (missing %PDF- header)"));
    }

    let version = extract_version(bytes);

    let document =
        Document::load_mem(bytes).map_err(|e| unavailable(format!("Failed to load PDF: {}", e)))?;

    // Reported, not rejected; edits may still fail later
    let encrypted = document.is_encrypted();

    let page_count = document.get_pages().len() as u32;
    if page_count == 0 {
        return Err(unavailable("PDF has no pages"));
    }

    let title = extract_title(&document);

    Ok(PdfInfo {
        page_count,
        version,
        encrypted,
        size_bytes: bytes.len(),
        title,
    })
}

/// Extract PDF version from header
fn extract_version(bytes: &[u8]) -> String {
    // Header format: %PDF-1.7
    if bytes.len() >= 8 && bytes.starts_with(b"%PDF-") {
        if let Ok(version) = std::str::from_utf8(&bytes[5..8]) {
            return version.trim().to_string();
        }
    }
    "1.4".to_string()
}

fn extract_title(document: &Document) -> Option<String> {
    let info_id = document.trailer.get(b"Info").ok()?.as_reference().ok()?;
    let info = document.objects.get(&info_id)?.as_dict().ok()?;
    let title = info.get(b"Title").ok()?.as_str().ok()?;
    let decoded = String::from_utf8_lossy(title);
    (!decoded.is_empty()).then(|| decoded.into_owned())
}
