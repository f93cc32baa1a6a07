use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfEditError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Invalid page range: {0}")]
    InvalidRange(String),

    #[error("Page {page} is out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("Invalid page selection: {0}")]
    InvalidSelection(String),

    #[error("Unsupported rotation angle: {0} (expected 90, 180 or 270)")]
    InvalidAngle(i64),

    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}
