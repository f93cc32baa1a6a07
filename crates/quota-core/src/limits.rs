//! Free-tier feature caps
//!
//! Each cap bounds both the number of uses per day and, for features that
//! take several inputs, the size of a single job.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A gated capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Feature {
    ImagesToPdf,
    PdfToImages,
    MergePdfs,
    SplitPdfPages,
    CompressPdf,
    RotatePdf,
    DeletePages,
}

impl Feature {
    pub const ALL: [Feature; 7] = [
        Feature::ImagesToPdf,
        Feature::PdfToImages,
        Feature::MergePdfs,
        Feature::SplitPdfPages,
        Feature::CompressPdf,
        Feature::RotatePdf,
        Feature::DeletePages,
    ];

    /// Free-tier cap
    pub fn limit(self) -> u32 {
        match self {
            Feature::ImagesToPdf => 5,
            Feature::PdfToImages => 3,
            Feature::MergePdfs => 2,
            Feature::SplitPdfPages => 5,
            Feature::CompressPdf => 3,
            Feature::RotatePdf => 3,
            Feature::DeletePages => 5,
        }
    }

    /// Key of this feature's counter in the persisted usage record
    pub fn counter_key(self) -> &'static str {
        match self {
            Feature::ImagesToPdf => "imagesToPdf",
            Feature::PdfToImages => "pdfToImages",
            Feature::MergePdfs => "mergePdfs",
            Feature::SplitPdfPages => "splitPdf",
            Feature::CompressPdf => "compressPdf",
            Feature::RotatePdf => "rotatePdf",
            Feature::DeletePages => "deletePages",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Feature::ImagesToPdf => "IMAGES_TO_PDF",
            Feature::PdfToImages => "PDF_TO_IMAGES",
            Feature::MergePdfs => "MERGE_PDFS",
            Feature::SplitPdfPages => "SPLIT_PDF_PAGES",
            Feature::CompressPdf => "COMPRESS_PDF",
            Feature::RotatePdf => "ROTATE_PDF",
            Feature::DeletePages => "DELETE_PAGES",
        }
    }

    /// Human-readable name
    pub fn label(self) -> &'static str {
        match self {
            Feature::ImagesToPdf => "Images to PDF",
            Feature::PdfToImages => "PDF to images",
            Feature::MergePdfs => "Merge PDFs",
            Feature::SplitPdfPages => "Split PDF",
            Feature::CompressPdf => "Compress PDF",
            Feature::RotatePdf => "Rotate PDF",
            Feature::DeletePages => "Delete pages",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = String;

    /// Accepts the constant name (`MERGE_PDFS`) or the counter key (`mergePdfs`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(s) || f.counter_key() == s)
            .ok_or_else(|| format!("Unknown feature: {}", s))
    }
}

/// What unlocking pro gives the user
pub const PRO_FEATURES: [&str; 7] = [
    "Unlimited image to PDF conversions",
    "Convert all PDF pages to images",
    "Merge unlimited PDFs",
    "Split all pages from PDFs",
    "High quality exports",
    "No ads",
    "Priority support",
];
