//! Document plumbing shared by the edit operations
//!
//! Loading, saving, page-number validation and page-tree helpers that
//! every operation needs. Page numbers are 1-indexed throughout.

use crate::error::PdfEditError;
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeSet;

/// Attributes a page may inherit from its ancestors in the page tree
pub(crate) const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Upper bound on page-tree depth when walking `/Parent` links
const MAX_TREE_DEPTH: usize = 64;

pub(crate) fn load(bytes: &[u8]) -> Result<Document, PdfEditError> {
    Document::load_mem(bytes).map_err(|e| PdfEditError::ParseError(e.to_string()))
}

pub(crate) fn save(doc: &mut Document) -> Result<Vec<u8>, PdfEditError> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfEditError::SerializationError(format!("Save failed: {}", e)))?;
    Ok(buffer)
}

/// Page object ids in page order
pub(crate) fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// Validate 1-indexed page numbers and return them sorted and deduplicated
pub(crate) fn normalize_pages(
    pages: &[u32],
    page_count: u32,
) -> Result<BTreeSet<u32>, PdfEditError> {
    if pages.is_empty() {
        return Err(PdfEditError::InvalidSelection("No pages specified".into()));
    }

    if pages.contains(&0) {
        return Err(PdfEditError::InvalidRange(
            "Page numbers must be >= 1".into(),
        ));
    }

    for &page in pages {
        if page > page_count {
            return Err(PdfEditError::InvalidRange(format!(
                "Page {} does not exist (document has {} pages)",
                page, page_count
            )));
        }
    }

    Ok(pages.iter().copied().collect())
}

/// Remove every page not in `keep`, then drop objects that became unreachable
pub(crate) fn retain_pages(doc: &mut Document, keep: &BTreeSet<u32>) {
    let page_count = doc.get_pages().len() as u32;

    // Delete in reverse so earlier page numbers stay valid
    let mut to_delete: Vec<u32> = (1..=page_count).filter(|p| !keep.contains(p)).collect();
    to_delete.reverse();
    for page_num in to_delete {
        doc.delete_pages(&[page_num]);
    }

    doc.prune_objects();
}

/// Look up an attribute on a page, falling back to its page-tree ancestors
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let dict = doc.get_object(current).and_then(Object::as_dict).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

/// Copy inheritable attributes onto each page so it no longer depends on
/// its original parent nodes
pub(crate) fn flatten_inherited_attributes(doc: &mut Document) -> Result<(), PdfEditError> {
    for page_id in page_ids(doc) {
        let mut missing = Vec::new();
        {
            let page = doc
                .get_object(page_id)
                .and_then(Object::as_dict)
                .map_err(|e| PdfEditError::OperationError(format!("Invalid page object: {}", e)))?;
            for key in INHERITABLE_KEYS {
                if page.has(key) {
                    continue;
                }
                if let Some(value) = inherited_attribute(doc, page_id, key) {
                    missing.push((key.to_vec(), value.clone()));
                }
            }
        }

        if missing.is_empty() {
            continue;
        }

        let page = doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| PdfEditError::OperationError(format!("Invalid page object: {}", e)))?;
        for (key, value) in missing {
            page.set(key, value);
        }
    }
    Ok(())
}

/// Page size in points from the (possibly inherited) MediaBox
pub(crate) fn page_size(doc: &Document, page_id: ObjectId) -> Option<(f32, f32)> {
    let media_box = inherited_attribute(doc, page_id, b"MediaBox")?.as_array().ok()?;
    if media_box.len() != 4 {
        return None;
    }

    let mut coords = [0f32; 4];
    for (slot, value) in coords.iter_mut().zip(media_box) {
        *slot = match value {
            Object::Integer(i) => *i as f32,
            Object::Real(r) => *r,
            _ => return None,
        };
    }

    Some(((coords[2] - coords[0]).abs(), (coords[3] - coords[1]).abs()))
}
