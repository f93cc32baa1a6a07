//! Re-serialize a PDF in a space-optimized form
//!
//! Drops unreachable objects and empty streams, deflates uncompressed
//! streams and renumbers objects so the xref table is dense.

use crate::document::{load, save};
use crate::error::PdfEditError;
use serde::Serialize;
use tracing::debug;

/// Before/after sizes of a compression run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompressionReport {
    pub original_size: u64,
    pub compressed_size: u64,
    /// `original_size - compressed_size`; negative when the output grew
    pub saved_bytes: i64,
    /// Rounded percentage saved, 0 when nothing was saved
    pub saved_percent: u32,
}

impl CompressionReport {
    pub fn new(original_size: u64, compressed_size: u64) -> Self {
        let saved_bytes = original_size as i64 - compressed_size as i64;
        let saved_percent = if original_size > 0 && saved_bytes > 0 {
            (saved_bytes as f64 / original_size as f64 * 100.0).round() as u32
        } else {
            0
        };

        Self {
            original_size,
            compressed_size,
            saved_bytes,
            saved_percent,
        }
    }

    /// The input was already as small as we could make it
    pub fn already_optimized(&self) -> bool {
        self.saved_bytes <= 0
    }
}

/// Compress a PDF, returning the new bytes and a size report
///
/// A result that is not smaller than the input is still a success.
pub fn compress_document(bytes: &[u8]) -> Result<(Vec<u8>, CompressionReport), PdfEditError> {
    let mut doc = load(bytes)?;

    let pruned = doc.prune_objects().len();
    let empty_streams = doc.delete_zero_length_streams().len();
    doc.compress();
    doc.renumber_objects();

    let output = save(&mut doc)?;
    let report = CompressionReport::new(bytes.len() as u64, output.len() as u64);

    debug!(
        pruned,
        empty_streams,
        original = report.original_size,
        compressed = report.compressed_size,
        "compressed document"
    );

    Ok((output, report))
}

/// Human-readable byte size ("1.5 KB")
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
