//! Fixtures shared by the unit tests

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

fn media_box() -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(612),
        Object::Integer(792),
    ])
}

fn add_labelled_page(doc: &mut Document, parent: ObjectId, label: &str) -> ObjectId {
    let content = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", label);
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

    let page = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Page".to_vec())),
        ("Parent", Object::Reference(parent)),
        ("Contents", Object::Reference(content_id)),
    ]);
    doc.add_object(page)
}

fn finish(mut doc: Document, pages_id: ObjectId) -> Vec<u8> {
    let catalog = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]);
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// A flat PDF whose page N carries the text `{prefix}-Page-{N}`
pub(crate) fn create_test_pdf(num_pages: u32, prefix: &str) -> Vec<u8> {
    create_rotated_pdf(num_pages, prefix, None)
}

/// Like [`create_test_pdf`] but with an explicit `/Rotate` on every page
pub(crate) fn create_rotated_pdf(num_pages: u32, prefix: &str, rotate: Option<i64>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for page_num in 1..=num_pages {
        let page_id = add_labelled_page(&mut doc, pages_id, &format!("{}-Page-{}", prefix, page_num));
        if let Some(angle) = rotate {
            if let Ok(Object::Dictionary(page)) = doc.get_object_mut(page_id) {
                page.set("Rotate", Object::Integer(angle));
            }
        }
        kids.push(Object::Reference(page_id));
    }

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(num_pages as i64)),
        ("Kids", Object::Array(kids)),
        ("MediaBox", media_box()),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    finish(doc, pages_id)
}

/// Four pages split across two intermediate page-tree nodes; `/Rotate` and
/// `/MediaBox` live only on the root node
pub(crate) fn create_nested_pdf(root_rotate: i64) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let root_id = doc.new_object_id();

    let mut branches = Vec::new();
    let mut page_num = 1;
    for _ in 0..2 {
        let branch_id = doc.new_object_id();
        let mut kids = Vec::new();
        for _ in 0..2 {
            let page_id = add_labelled_page(&mut doc, branch_id, &format!("Nested-Page-{}", page_num));
            kids.push(Object::Reference(page_id));
            page_num += 1;
        }
        let branch = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Parent", Object::Reference(root_id)),
            ("Count", Object::Integer(2)),
            ("Kids", Object::Array(kids)),
        ]);
        doc.objects.insert(branch_id, Object::Dictionary(branch));
        branches.push(Object::Reference(branch_id));
    }

    let root = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(4)),
        ("Kids", Object::Array(branches)),
        ("MediaBox", media_box()),
        ("Rotate", Object::Integer(root_rotate)),
    ]);
    doc.objects.insert(root_id, Object::Dictionary(root));

    finish(doc, root_id)
}

/// The text label drawn on each page, in page order
pub(crate) fn page_labels(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .into_values()
        .map(|page_id| {
            let content = doc.get_page_content(page_id).unwrap();
            let text = String::from_utf8_lossy(&content);
            let start = text.find('(').map(|i| i + 1).unwrap_or(0);
            let end = text.rfind(')').unwrap_or(text.len());
            text[start..end].to_string()
        })
        .collect()
}

/// A minimal baseline JPEG header: SOI, APP0 and an SOF0 frame
pub(crate) fn jpeg_header(width: u16, height: u16, components: u8) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8];
    // APP0 / JFIF
    bytes.extend_from_slice(&[
        0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01, 0x00,
        0x01, 0x00, 0x00,
    ]);
    // SOF0
    let length = 8 + 3 * components as u16;
    bytes.extend_from_slice(&[0xFF, 0xC0]);
    bytes.extend_from_slice(&length.to_be_bytes());
    bytes.push(8);
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.push(components);
    for id in 1..=components {
        bytes.extend_from_slice(&[id, 0x11, 0x00]);
    }
    // EOI
    bytes.extend_from_slice(&[0xFF, 0xD9]);
    bytes
}

/// Encode a solid-colour PNG
pub(crate) fn png_image(width: u32, height: u32, color: png::ColorType) -> Vec<u8> {
    let channels = match color {
        png::ColorType::Grayscale => 1,
        png::ColorType::GrayscaleAlpha => 2,
        png::ColorType::Rgb => 3,
        png::ColorType::Rgba => 4,
        png::ColorType::Indexed => 1,
    };
    let pixels = vec![0x80u8; (width * height) as usize * channels];

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(color);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&pixels).unwrap();
    }
    out
}
