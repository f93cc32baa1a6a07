//! PDF Merge algorithm
//!
//! Combines multiple PDFs into a single document, in the order given.

use crate::document::{flatten_inherited_attributes, page_ids, save};
use crate::error::PdfEditError;
use lopdf::{Document, Object, ObjectId};
use tracing::debug;

/// Merge multiple PDFs into one
///
/// The algorithm:
/// 1. Require at least two documents
/// 2. Use the first document as the destination
/// 3. For each remaining source document:
///    a. Copy inherited page attributes onto its pages
///    b. Calculate ID offset to avoid conflicts
///    c. Import all objects with remapped IDs
///    d. Append its pages to the destination page list
/// 4. Rebuild a flat page tree, prune orphans, compress and serialize
pub fn merge_documents(documents: Vec<Vec<u8>>) -> Result<Vec<u8>, PdfEditError> {
    if documents.len() < 2 {
        return Err(PdfEditError::InvalidSelection(format!(
            "At least 2 documents are required to merge (got {})",
            documents.len()
        )));
    }

    // Load all documents first
    let mut loaded_docs = Vec::with_capacity(documents.len());
    for (i, doc_bytes) in documents.iter().enumerate() {
        let doc = Document::load_mem(doc_bytes).map_err(|e| {
            PdfEditError::ParseError(format!("Failed to load document {}: {}", i + 1, e))
        })?;
        loaded_docs.push(doc);
    }

    // Start with the first document as the base
    let mut dest = loaded_docs.remove(0);
    flatten_inherited_attributes(&mut dest)?;
    let mut dest_max_id = dest.max_id;
    let mut dest_page_refs = page_ids(&dest);

    for mut source in loaded_docs.into_iter() {
        flatten_inherited_attributes(&mut source)?;
        let source_pages = page_ids(&source);

        let id_offset = dest_max_id;

        for (old_id, mut object) in source.objects.into_iter() {
            remap_object_refs(&mut object, id_offset);
            dest.objects.insert((old_id.0 + id_offset, old_id.1), object);
        }

        dest_page_refs.extend(
            source_pages
                .into_iter()
                .map(|(num, generation)| (num + id_offset, generation)),
        );

        dest_max_id = (source.max_id + id_offset).max(dest_max_id);
    }

    dest.max_id = dest_max_id;
    debug!(pages = dest_page_refs.len(), "merged page list built");

    update_page_tree(&mut dest, &dest_page_refs)?;

    // Source catalogs and page-tree nodes are now unreachable
    dest.prune_objects();
    dest.compress();

    save(&mut dest)
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: &mut Object, offset: u32) {
    match obj {
        Object::Reference(id) => id.0 += offset,
        Object::Array(arr) => {
            for item in arr.iter_mut() {
                remap_object_refs(item, offset);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                remap_object_refs(value, offset);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                remap_object_refs(value, offset);
            }
        }
        _ => {}
    }
}

/// Point the destination's root page-tree node at `page_refs` and re-parent
/// every page onto it
fn update_page_tree(doc: &mut Document, page_refs: &[ObjectId]) -> Result<(), PdfEditError> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| PdfEditError::OperationError("No Root in trailer".into()))?;

    let pages_id = doc
        .get_object(catalog_id)
        .and_then(Object::as_dict)
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|_| PdfEditError::OperationError("No Pages in catalog".into()))?;

    match doc.objects.get_mut(&pages_id) {
        Some(Object::Dictionary(pages_dict)) => {
            let kids = page_refs
                .iter()
                .map(|&id| Object::Reference(id))
                .collect::<Vec<_>>();
            pages_dict.set("Kids", Object::Array(kids));
            pages_dict.set("Count", Object::Integer(page_refs.len() as i64));
        }
        _ => {
            return Err(PdfEditError::OperationError(
                "Invalid pages dictionary".into(),
            ))
        }
    }

    for &page_id in page_refs {
        if let Some(Object::Dictionary(page)) = doc.objects.get_mut(&page_id) {
            page.set("Parent", Object::Reference(pages_id));
        }
    }

    Ok(())
}
