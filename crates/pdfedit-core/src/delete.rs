//! Delete pages from a PDF
//!
//! The inverse of split: the whitelist is every page that was *not* selected.

use crate::document::{load, normalize_pages, retain_pages, save};
use crate::error::PdfEditError;
use std::collections::BTreeSet;
use tracing::debug;

/// Remove the specified pages (1-indexed), keeping the rest in their original order
///
/// The selection must be non-empty and must leave at least one page behind.
pub fn delete_pages(bytes: &[u8], pages: &[u32]) -> Result<Vec<u8>, PdfEditError> {
    let mut doc = load(bytes)?;
    let page_count = doc.get_pages().len() as u32;
    let remove = normalize_pages(pages, page_count)?;

    if remove.len() as u32 >= page_count {
        return Err(PdfEditError::InvalidSelection(
            "Cannot delete all pages; at least one page must remain".into(),
        ));
    }

    let keep: BTreeSet<u32> = (1..=page_count).filter(|p| !remove.contains(p)).collect();

    debug!(page_count, deleted = remove.len(), "deleting pages");

    retain_pages(&mut doc, &keep);
    doc.compress();

    save(&mut doc)
}
