//! Page-level PDF editing
//!
//! Delete, rotate, split, merge and compress PDFs, and build PDFs from
//! images, using lopdf. Every operation takes document bytes and returns
//! new bytes; inputs are never modified. Page numbers are 1-indexed.
//!
//! Rendering pages to images goes through the [`raster::PageRasterizer`]
//! boundary, which a platform renderer implements.

pub mod compress;
pub mod delete;
mod document;
pub mod error;
pub mod images;
pub mod job;
pub mod merge;
pub mod raster;
pub mod rotate;
pub mod split;

#[cfg(test)]
mod test_support;

pub use compress::{compress_document, format_file_size, CompressionReport};
pub use delete::delete_pages;
pub use error::PdfEditError;
pub use images::{detect_format, image_dimensions, images_to_pdf, ImageFormat};
pub use job::{execute, EditJob, EditKind, EditOutcome, ProcessMetrics};
pub use merge::merge_documents;
pub use raster::{
    fit_within, materialize, normalize_file_uri, ContentResolver, PageRasterizer,
    PlaceholderRasterizer, RasterError, RasterOptions, SourceLocation,
};
pub use rotate::{page_rotations, rotate_document, RotationAngle};
pub use split::split_document;

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, PdfEditError> {
    let doc = document::load(bytes)?;
    Ok(doc.get_pages().len() as u32)
}

/// Parse page range string like "1-3, 5, 8-10" into sorted unique page numbers
///
/// Every page must lie within `1..=page_count`; ranges are bounds-checked
/// before they are expanded.
pub fn parse_ranges(input: &str, page_count: u32) -> Result<Vec<u32>, PdfEditError> {
    use std::collections::BTreeSet;

    let mut pages = BTreeSet::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            // Range like "1-3"
            let start: u32 = start
                .trim()
                .parse()
                .map_err(|_| PdfEditError::InvalidRange(format!("Invalid start: {}", start)))?;
            let end: u32 = end
                .trim()
                .parse()
                .map_err(|_| PdfEditError::InvalidRange(format!("Invalid end: {}", end)))?;

            if start > end {
                return Err(PdfEditError::InvalidRange(format!(
                    "Start {} > end {}",
                    start, end
                )));
            }
            if start == 0 {
                return Err(PdfEditError::InvalidRange(
                    "Page numbers must be >= 1".into(),
                ));
            }
            check_page(start, page_count)?;
            check_page(end, page_count)?;

            pages.extend(start..=end);
        } else {
            // Single page like "5"
            let page: u32 = part
                .parse()
                .map_err(|_| PdfEditError::InvalidRange(format!("Invalid page: {}", part)))?;
            if page == 0 {
                return Err(PdfEditError::InvalidRange(
                    "Page numbers must be >= 1".into(),
                ));
            }
            check_page(page, page_count)?;
            pages.insert(page);
        }
    }

    Ok(pages.into_iter().collect())
}

fn check_page(page: u32, page_count: u32) -> Result<(), PdfEditError> {
    if page > page_count {
        return Err(PdfEditError::PageOutOfRange { page, page_count });
    }
    Ok(())
}
