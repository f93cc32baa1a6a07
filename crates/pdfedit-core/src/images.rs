//! Images to PDF
//!
//! One page per image, sized exactly to the image's pixel dimensions, with
//! the image drawn at the origin filling the page.
//!
//! - **JPEG**: embedded verbatim with the `DCTDecode` filter
//! - **PNG**: decoded to 8-bit samples and re-encoded with `FlateDecode`;
//!   an alpha channel becomes an `/SMask`

use crate::document::save;
use crate::error::PdfEditError;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;
use tracing::debug;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_SOI: &[u8] = &[0xFF, 0xD8];

/// Image container formats we can embed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

/// Sniff the image format from its magic bytes
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.starts_with(PNG_SIGNATURE) {
        Some(ImageFormat::Png)
    } else if bytes.len() > 2 && bytes.starts_with(JPEG_SOI) && bytes[2] == 0xFF {
        Some(ImageFormat::Jpeg)
    } else {
        None
    }
}

/// An image ready to become an Image XObject
struct EmbeddedImage {
    width: u32,
    height: u32,
    color_space: &'static str,
    filter: &'static str,
    data: Vec<u8>,
    /// Flate-compressed 8-bit alpha samples
    alpha: Option<Vec<u8>>,
}

/// Pixel dimensions of an image without decoding its samples
pub fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32), PdfEditError> {
    match detect_format(bytes) {
        Some(ImageFormat::Jpeg) => parse_jpeg_header(bytes).map(|(w, h, _)| (w, h)),
        Some(ImageFormat::Png) => {
            let decoder = png::Decoder::new(bytes);
            let reader = decoder
                .read_info()
                .map_err(|e| PdfEditError::UnsupportedImage(format!("Invalid PNG: {}", e)))?;
            let info = reader.info();
            Ok((info.width, info.height))
        }
        None => Err(PdfEditError::UnsupportedImage(
            "Only JPEG and PNG images are supported".into(),
        )),
    }
}

fn decode_image(bytes: &[u8]) -> Result<EmbeddedImage, PdfEditError> {
    match detect_format(bytes) {
        Some(ImageFormat::Jpeg) => decode_jpeg(bytes),
        Some(ImageFormat::Png) => decode_png(bytes),
        None => Err(PdfEditError::UnsupportedImage(
            "Only JPEG and PNG images are supported".into(),
        )),
    }
}

/// Read width, height and component count from the first SOF segment
fn parse_jpeg_header(data: &[u8]) -> Result<(u32, u32, u8), PdfEditError> {
    if !data.starts_with(JPEG_SOI) {
        return Err(PdfEditError::UnsupportedImage("Not a valid JPEG".into()));
    }

    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }

        let marker = data[pos + 1];
        if marker == 0xFF {
            // Fill byte
            pos += 1;
            continue;
        }
        pos += 2;

        // Standalone markers carry no length
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            continue;
        }

        let length = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;

        let is_start_of_frame = matches!(
            marker,
            0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF
        );
        if is_start_of_frame {
            if pos + 8 > data.len() {
                break;
            }
            let height = u16::from_be_bytes([data[pos + 3], data[pos + 4]]) as u32;
            let width = u16::from_be_bytes([data[pos + 5], data[pos + 6]]) as u32;
            let components = data[pos + 7];
            return Ok((width, height, components));
        }

        pos += length;
    }

    Err(PdfEditError::UnsupportedImage(
        "Truncated JPEG: no frame header found".into(),
    ))
}

fn decode_jpeg(bytes: &[u8]) -> Result<EmbeddedImage, PdfEditError> {
    let (width, height, components) = parse_jpeg_header(bytes)?;
    let color_space = match components {
        1 => "DeviceGray",
        3 => "DeviceRGB",
        4 => "DeviceCMYK",
        other => {
            return Err(PdfEditError::UnsupportedImage(format!(
                "JPEG with {} colour components",
                other
            )))
        }
    };

    Ok(EmbeddedImage {
        width,
        height,
        color_space,
        filter: "DCTDecode",
        data: bytes.to_vec(),
        alpha: None,
    })
}

fn decode_png(bytes: &[u8]) -> Result<EmbeddedImage, PdfEditError> {
    let invalid = |e: png::DecodingError| PdfEditError::UnsupportedImage(format!("Invalid PNG: {}", e));

    let mut decoder = png::Decoder::new(bytes);
    decoder.set_transformations(png::Transformations::normalize_to_color8());
    let mut reader = decoder.read_info().map_err(invalid)?;

    let mut buffer = vec![0; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buffer).map_err(invalid)?;
    buffer.truncate(frame.buffer_size());

    let (color_space, samples, alpha) = match frame.color_type {
        png::ColorType::Grayscale => ("DeviceGray", buffer, None),
        png::ColorType::Rgb => ("DeviceRGB", buffer, None),
        png::ColorType::GrayscaleAlpha => {
            let (gray, alpha) = split_alpha(&buffer, 1);
            ("DeviceGray", gray, Some(alpha))
        }
        png::ColorType::Rgba => {
            let (rgb, alpha) = split_alpha(&buffer, 3);
            ("DeviceRGB", rgb, Some(alpha))
        }
        png::ColorType::Indexed => {
            return Err(PdfEditError::UnsupportedImage(
                "Indexed PNG could not be expanded".into(),
            ))
        }
    };

    Ok(EmbeddedImage {
        width: frame.width,
        height: frame.height,
        color_space,
        filter: "FlateDecode",
        data: deflate(&samples)?,
        alpha: alpha.map(|a| deflate(&a)).transpose()?,
    })
}

/// Separate interleaved colour samples from a trailing alpha sample
fn split_alpha(samples: &[u8], color_channels: usize) -> (Vec<u8>, Vec<u8>) {
    let stride = color_channels + 1;
    let pixels = samples.len() / stride;
    let mut color = Vec::with_capacity(pixels * color_channels);
    let mut alpha = Vec::with_capacity(pixels);
    for pixel in samples.chunks_exact(stride) {
        color.extend_from_slice(&pixel[..color_channels]);
        alpha.push(pixel[color_channels]);
    }
    (color, alpha)
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, PdfEditError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| PdfEditError::OperationError(format!("Image compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| PdfEditError::OperationError(format!("Image compression failed: {}", e)))
}

fn image_stream(
    width: u32,
    height: u32,
    color_space: &str,
    filter: &str,
    data: Vec<u8>,
) -> Stream {
    let dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"XObject".to_vec())),
        ("Subtype", Object::Name(b"Image".to_vec())),
        ("Width", Object::Integer(width as i64)),
        ("Height", Object::Integer(height as i64)),
        ("ColorSpace", Object::Name(color_space.as_bytes().to_vec())),
        ("BitsPerComponent", Object::Integer(8)),
        ("Filter", Object::Name(filter.as_bytes().to_vec())),
    ]);
    let mut stream = Stream::new(dict, data);
    // Already encoded
    stream.allows_compression = false;
    stream
}

fn embed_image(doc: &mut Document, image: EmbeddedImage) -> ObjectId {
    let mut stream = image_stream(
        image.width,
        image.height,
        image.color_space,
        image.filter,
        image.data,
    );

    if let Some(alpha) = image.alpha {
        let mask = image_stream(image.width, image.height, "DeviceGray", "FlateDecode", alpha);
        let mask_id = doc.add_object(mask);
        stream.dict.set("SMask", Object::Reference(mask_id));
    }

    doc.add_object(stream)
}

fn add_image_page(
    doc: &mut Document,
    pages_id: ObjectId,
    image: EmbeddedImage,
) -> Result<ObjectId, PdfEditError> {
    let width = image.width as i64;
    let height = image.height as i64;
    let image_id = embed_image(doc, image);

    // Scale the unit square to the full page
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(width),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(height),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content
        .encode()
        .map_err(|e| PdfEditError::OperationError(format!("Content encoding failed: {}", e)))?;
    let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

    let resources = Dictionary::from_iter(vec![(
        "XObject",
        Object::Dictionary(Dictionary::from_iter(vec![(
            "Im0",
            Object::Reference(image_id),
        )])),
    )]);

    let page = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Page".to_vec())),
        ("Parent", Object::Reference(pages_id)),
        (
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width),
                Object::Integer(height),
            ]),
        ),
        ("Resources", Object::Dictionary(resources)),
        ("Contents", Object::Reference(content_id)),
    ]);

    Ok(doc.add_object(page))
}

/// Build a PDF with one page per image, in the order given
pub fn images_to_pdf(images: &[Vec<u8>]) -> Result<Vec<u8>, PdfEditError> {
    if images.is_empty() {
        return Err(PdfEditError::InvalidSelection("No images specified".into()));
    }

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::with_capacity(images.len());
    for (index, bytes) in images.iter().enumerate() {
        let image = decode_image(bytes).map_err(|e| match e {
            PdfEditError::UnsupportedImage(msg) => {
                PdfEditError::UnsupportedImage(format!("image {}: {}", index + 1, msg))
            }
            other => other,
        })?;

        if image.width == 0 || image.height == 0 {
            return Err(PdfEditError::UnsupportedImage(format!(
                "image {}: zero-sized image",
                index + 1
            )));
        }

        debug!(index, width = image.width, height = image.height, "embedding image");
        let page_id = add_image_page(&mut doc, pages_id, image)?;
        kids.push(Object::Reference(page_id));
    }

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(kids.len() as i64)),
        ("Kids", Object::Array(kids)),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]);
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    doc.compress();
    save(&mut doc)
}
