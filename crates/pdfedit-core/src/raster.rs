//! PDF to images: the boundary with the platform page renderer
//!
//! Rasterizing PDF pages is delegated to a platform renderer implementing
//! [`PageRasterizer`]. This module owns the contract around it: where the
//! source lives, how big pages may get, how failures are categorized, and
//! how an opaque content reference is copied somewhere readable first.

use crate::document::{load, page_ids, page_size};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

/// Longest side of a rendered page when no bound is given
pub const DEFAULT_MAX_DIM: u32 = 1200;

const FILE_SCHEME: &str = "file://";
const CONTENT_SCHEME: &str = "content://";

/// Where the source PDF lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// Opaque provider reference that must be opened through a resolver
    ContentRef(String),
    /// Directly readable file
    File(PathBuf),
}

impl SourceLocation {
    /// Classify a URI-ish string; bare paths are files
    pub fn parse(uri: &str) -> Self {
        if uri.starts_with(CONTENT_SCHEME) {
            SourceLocation::ContentRef(uri.to_string())
        } else if let Some(path) = uri.strip_prefix(FILE_SCHEME) {
            SourceLocation::File(PathBuf::from(path))
        } else {
            SourceLocation::File(PathBuf::from(uri))
        }
    }
}

/// Render options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterOptions {
    /// Longest allowed side in pixels; 0 means [`DEFAULT_MAX_DIM`]
    pub max_dim: u32,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            max_dim: DEFAULT_MAX_DIM,
        }
    }
}

impl RasterOptions {
    pub fn effective_max_dim(&self) -> u32 {
        if self.max_dim == 0 {
            DEFAULT_MAX_DIM
        } else {
            self.max_dim
        }
    }
}

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("{0}")]
    UnsupportedPlatform(String),

    #[error("{0}")]
    SourceNotFound(String),

    #[error("{0}")]
    PermissionRequired(String),

    #[error("Failed to convert PDF: {0}")]
    Failed(String),
}

impl RasterError {
    /// Stable category code
    pub fn code(&self) -> &'static str {
        match self {
            RasterError::UnsupportedPlatform(_) => "unsupported",
            RasterError::SourceNotFound(_) => "not_found",
            RasterError::PermissionRequired(_) => "permission_required",
            RasterError::Failed(_) => "error",
        }
    }
}

/// A platform renderer that turns each page into an image file
pub trait PageRasterizer {
    /// Render every page in order, returning one image location per page
    fn convert(
        &self,
        source: &SourceLocation,
        options: &RasterOptions,
    ) -> Result<Vec<PathBuf>, RasterError>;
}

/// Opens opaque content references
pub trait ContentResolver {
    fn open(&self, reference: &str) -> io::Result<Box<dyn Read>>;
}

/// Scale `(width, height)` down so neither side exceeds `max_dim`,
/// preserving aspect ratio. Never scales up.
pub fn fit_within(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    let longest = width.max(height);
    if max_dim == 0 || longest <= max_dim {
        return (width, height);
    }

    let scale = max_dim as f64 / longest as f64;
    let scaled = |side: u32| ((side as f64 * scale).floor() as u32).clamp(1, max_dim);
    (scaled(width), scaled(height))
}

/// Render a path or URI as a `file://` URI, leaving other schemes alone
pub fn normalize_file_uri(path_or_uri: &str) -> String {
    if path_or_uri.contains("://") {
        path_or_uri.to_string()
    } else {
        format!("{}{}", FILE_SCHEME, path_or_uri)
    }
}

fn unique_suffix() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Make the source readable as a plain file
///
/// Files are checked for existence and readability; content references are
/// copied into `temp_dir` through `resolver`.
pub fn materialize(
    source: &SourceLocation,
    temp_dir: &Path,
    resolver: Option<&dyn ContentResolver>,
) -> Result<PathBuf, RasterError> {
    match source {
        SourceLocation::File(path) => match fs::metadata(path) {
            Ok(meta) if meta.is_file() => Ok(path.clone()),
            Ok(_) => Err(RasterError::SourceNotFound(format!(
                "File not found: {}",
                path.display()
            ))),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                Err(RasterError::PermissionRequired(
                    "Read permission is required to access this file. Please grant it and try again."
                        .into(),
                ))
            }
            Err(_) => Err(RasterError::SourceNotFound(format!(
                "File not found: {}",
                path.display()
            ))),
        },
        SourceLocation::ContentRef(reference) => {
            let not_accessible = || {
                RasterError::SourceNotFound(
                    "Could not access content reference. Please ensure the app has read permission or pick the file again."
                        .into(),
                )
            };

            let resolver = resolver.ok_or_else(not_accessible)?;
            let mut input = resolver.open(reference).map_err(|e| {
                warn!(reference = %reference, error = %e, "content reference could not be opened");
                not_accessible()
            })?;

            let out_path = temp_dir.join(format!("pdf_copy_{}.pdf", unique_suffix()));
            let mut output = fs::File::create(&out_path)
                .map_err(|e| RasterError::Failed(format!("Could not create temp copy: {}", e)))?;
            io::copy(&mut input, &mut output)
                .map_err(|e| RasterError::Failed(format!("Could not copy content: {}", e)))?;

            debug!(path = %out_path.display(), "copied content reference to temp file");
            Ok(out_path)
        }
    }
}

fn failed(e: impl std::fmt::Display) -> RasterError {
    RasterError::Failed(e.to_string())
}

/// Stand-in renderer that writes one blank page-sized PNG per page
///
/// Used where the platform renderer is unavailable (tests, the CLI). Page
/// sizes come from each page's MediaBox at 72 dpi, bounded by `max_dim`.
pub struct PlaceholderRasterizer {
    out_dir: PathBuf,
    resolver: Option<Box<dyn ContentResolver>>,
}

impl PlaceholderRasterizer {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            resolver: None,
        }
    }

    pub fn with_resolver(mut self, resolver: Box<dyn ContentResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    fn write_blank_png(path: &Path, width: u32, height: u32) -> Result<(), RasterError> {
        let file = fs::File::create(path).map_err(failed)?;
        let mut encoder = png::Encoder::new(io::BufWriter::new(file), width, height);
        encoder.set_color(png::ColorType::Grayscale);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().map_err(failed)?;
        let white = vec![0xFFu8; (width as usize) * (height as usize)];
        writer.write_image_data(&white).map_err(failed)?;
        writer.finish().map_err(failed)?;
        Ok(())
    }
}

impl PageRasterizer for PlaceholderRasterizer {
    fn convert(
        &self,
        source: &SourceLocation,
        options: &RasterOptions,
    ) -> Result<Vec<PathBuf>, RasterError> {
        let path = materialize(source, &self.out_dir, self.resolver.as_deref())?;
        let mut files = TempFiles {
            temp_copy: matches!(source, SourceLocation::ContentRef(_)).then(|| path.clone()),
            outputs: Vec::new(),
        };

        let bytes = fs::read(&path).map_err(failed)?;
        let doc = load(&bytes).map_err(failed)?;
        let max_dim = options.effective_max_dim();
        let stamp = unique_suffix();

        for (index, page_id) in page_ids(&doc).into_iter().enumerate() {
            let (w, h) = page_size(&doc, page_id).unwrap_or((612.0, 792.0));
            let (width, height) = fit_within(
                w.round().max(1.0) as u32,
                h.round().max(1.0) as u32,
                max_dim,
            );

            let out = self
                .out_dir
                .join(format!("pdf_page_{}_{}.png", index + 1, stamp));
            files.outputs.push(out.clone());
            Self::write_blank_png(&out, width, height)?;
        }

        Ok(files.keep_outputs())
    }
}

/// Files removed when a conversion ends: the temp copy of a content
/// reference always, rendered pages unless the conversion succeeded
struct TempFiles {
    temp_copy: Option<PathBuf>,
    outputs: Vec<PathBuf>,
}

impl TempFiles {
    fn keep_outputs(mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.outputs)
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        for path in self.temp_copy.iter().chain(&self.outputs) {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "failed to remove temp file");
                }
            }
        }
    }
}
