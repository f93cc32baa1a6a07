use crate::compress::{compress_document, CompressionReport};
use crate::delete::delete_pages;
use crate::error::PdfEditError;
use crate::images::images_to_pdf;
use crate::merge::merge_documents;
use crate::rotate::{rotate_document, RotationAngle};
use crate::split::split_document;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// A single document edit
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum EditJob {
    DeletePages { file: Vec<u8>, pages: Vec<u32> },
    Rotate { file: Vec<u8>, angle: RotationAngle },
    Split { file: Vec<u8>, pages: Vec<u32> },
    Merge { files: Vec<Vec<u8>> },
    Compress { file: Vec<u8> },
    ImagesToPdf { images: Vec<Vec<u8>> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditKind {
    DeletePages,
    Rotate,
    Split,
    Merge,
    Compress,
    ImagesToPdf,
}

impl EditKind {
    pub fn name(self) -> &'static str {
        match self {
            EditKind::DeletePages => "delete-pages",
            EditKind::Rotate => "rotate",
            EditKind::Split => "split",
            EditKind::Merge => "merge",
            EditKind::Compress => "compress",
            EditKind::ImagesToPdf => "images-to-pdf",
        }
    }
}

impl EditJob {
    pub fn kind(&self) -> EditKind {
        match self {
            EditJob::DeletePages { .. } => EditKind::DeletePages,
            EditJob::Rotate { .. } => EditKind::Rotate,
            EditJob::Split { .. } => EditKind::Split,
            EditJob::Merge { .. } => EditKind::Merge,
            EditJob::Compress { .. } => EditKind::Compress,
            EditJob::ImagesToPdf { .. } => EditKind::ImagesToPdf,
        }
    }

    fn input_size(&self) -> usize {
        match self {
            EditJob::DeletePages { file, .. }
            | EditJob::Rotate { file, .. }
            | EditJob::Split { file, .. }
            | EditJob::Compress { file } => file.len(),
            EditJob::Merge { files } => files.iter().map(Vec::len).sum(),
            EditJob::ImagesToPdf { images } => images.iter().map(Vec::len).sum(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: u32,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub bytes: Vec<u8>,
    pub metrics: ProcessMetrics,
    /// Present only for compression jobs
    pub compression: Option<CompressionReport>,
}

/// Run an edit job to completion
pub fn execute(job: EditJob) -> Result<EditOutcome, PdfEditError> {
    let kind = job.kind();
    let input_size = job.input_size();
    let started = Instant::now();

    let mut compression = None;
    let bytes = match job {
        EditJob::DeletePages { file, pages } => delete_pages(&file, &pages)?,
        EditJob::Rotate { file, angle } => rotate_document(&file, angle)?,
        EditJob::Split { file, pages } => split_document(&file, &pages)?,
        EditJob::Merge { files } => merge_documents(files)?,
        EditJob::Compress { file } => {
            let (bytes, report) = compress_document(&file)?;
            compression = Some(report);
            bytes
        }
        EditJob::ImagesToPdf { images } => images_to_pdf(&images)?,
    };

    let page_count = crate::get_page_count(&bytes)?;
    let metrics = ProcessMetrics {
        input_size_bytes: input_size,
        output_size_bytes: bytes.len(),
        page_count,
        processing_time_ms: started.elapsed().as_millis() as u64,
    };

    info!(
        job = kind.name(),
        pages = metrics.page_count,
        input = metrics.input_size_bytes,
        output = metrics.output_size_bytes,
        ms = metrics.processing_time_ms,
        "edit job finished"
    );

    Ok(EditOutcome {
        bytes,
        metrics,
        compression,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_pdf, jpeg_header, page_labels};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_job_deserializes_rotate() {
        let json = r#"{"type":"Rotate","file":[],"angle":270}"#;
        let job: EditJob = serde_json::from_str(json).unwrap();
        assert_eq!(job.kind(), EditKind::Rotate);
    }

    #[test]
    fn test_job_rejects_bad_angle() {
        let json = r#"{"type":"Rotate","file":[],"angle":45}"#;
        assert!(serde_json::from_str::<EditJob>(json).is_err());
    }

    #[test]
    fn test_job_deserializes_delete() {
        let json = r#"{"type":"DeletePages","file":[],"pages":[1,2]}"#;
        let job: EditJob = serde_json::from_str(json).unwrap();
        assert!(matches!(job, EditJob::DeletePages { ref pages, .. } if pages == &vec![1, 2]));
    }

    #[test]
    fn test_execute_split_reports_metrics() {
        let pdf = create_test_pdf(5, "Job");
        let input = pdf.len();
        let outcome = execute(EditJob::Split {
            file: pdf,
            pages: vec![2, 4],
        })
        .unwrap();

        assert_eq!(page_labels(&outcome.bytes), vec!["Job-Page-2", "Job-Page-4"]);
        assert_eq!(outcome.metrics.page_count, 2);
        assert_eq!(outcome.metrics.input_size_bytes, input);
        assert_eq!(outcome.metrics.output_size_bytes, outcome.bytes.len());
        assert!(outcome.compression.is_none());
    }

    #[test]
    fn test_execute_compress_carries_report() {
        let outcome = execute(EditJob::Compress {
            file: create_test_pdf(2, "Job"),
        })
        .unwrap();
        let report = outcome.compression.unwrap();
        assert_eq!(report.compressed_size, outcome.bytes.len() as u64);
    }

    #[test]
    fn test_execute_images_to_pdf() {
        let outcome = execute(EditJob::ImagesToPdf {
            images: vec![jpeg_header(10, 20, 3), jpeg_header(30, 40, 1)],
        })
        .unwrap();
        assert_eq!(outcome.metrics.page_count, 2);
    }

    #[test]
    fn test_execute_propagates_errors() {
        let result = execute(EditJob::Merge { files: vec![] });
        assert!(matches!(result, Err(PdfEditError::InvalidSelection(_))));
    }
}
