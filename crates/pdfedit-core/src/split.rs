//! PDF Split (extract) algorithm
//!
//! Extracts pages from a PDF using "Construction by Whitelist".

use crate::document::{load, normalize_pages, retain_pages, save};
use crate::error::PdfEditError;
use tracing::debug;

/// Split a PDF, extracting only the specified pages (1-indexed)
///
/// Output pages are always in ascending page order, whatever order the
/// selection was made in. Duplicate page numbers collapse to one page.
///
/// Uses "Construction by Whitelist" algorithm:
/// 1. Identify target page objects
/// 2. Delete every other page from the page tree
/// 3. Prune objects no longer reachable from the trailer
/// 4. Compress and serialize
pub fn split_document(bytes: &[u8], pages: &[u32]) -> Result<Vec<u8>, PdfEditError> {
    let mut doc = load(bytes)?;
    let page_count = doc.get_pages().len() as u32;
    let keep = normalize_pages(pages, page_count)?;

    debug!(page_count, extracted = keep.len(), "extracting pages");

    retain_pages(&mut doc, &keep);
    doc.compress();

    save(&mut doc)
}
