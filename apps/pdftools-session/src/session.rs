//! Stateful tool sessions
//!
//! A [`ToolSession`] holds one tool's inputs (documents or images, the page
//! selection, the rotation angle) and runs the gated workflow: check the
//! quota, validate the inputs, run the edit, record one use.

use crate::diagnostics::DiagnosticReporter;
use crate::error::{SelectionError, ToolError};
use crate::selection::{PageSelection, SelectAll};
use crate::validation::{validate_pdf, PdfInfo};
use chrono::Local;
use pdfedit_core::{
    detect_format, EditJob, EditOutcome, PageRasterizer, RasterError, RasterOptions,
    RotationAngle, SourceLocation,
};
use quota_core::{EntitlementGate, Feature};
use serde::Serialize;
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Documents needed for a merge
const MERGE_MINIMUM: usize = 2;

/// Shared "a job is running" flag
#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Claim the flag until the returned token is dropped
    pub fn try_start(&self) -> Result<BusyToken, ToolError> {
        self.0
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ToolError::Busy)?;
        Ok(BusyToken(Arc::clone(&self.0)))
    }
}

pub struct BusyToken(Arc<AtomicBool>);

impl Drop for BusyToken {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct DocumentEntry {
    name: String,
    bytes: Vec<u8>,
    info: PdfInfo,
}

struct ImageEntry {
    name: String,
    bytes: Vec<u8>,
}

/// Result of adding images to an images-to-PDF session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagesAdded {
    pub added: usize,
    /// Some images were dropped to stay within the free-tier cap
    pub truncated: bool,
}

/// Summary of one loaded document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub name: String,
    pub page_count: u32,
    pub size_bytes: usize,
    pub version: String,
}

/// A finished edit and the message to show for it
#[derive(Debug, Clone)]
pub struct JobReport {
    pub outcome: EditOutcome,
    pub message: String,
}

/// A finished PDF-to-images conversion
#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub images: Vec<PathBuf>,
    /// Pages past the free-tier cap were dropped
    pub truncated: bool,
}

pub struct ToolSession {
    feature: Feature,
    gate: EntitlementGate,
    reporter: Arc<DiagnosticReporter>,
    busy: BusyFlag,
    documents: Vec<DocumentEntry>,
    images: Vec<ImageEntry>,
    selection: Option<PageSelection>,
    rotation: RotationAngle,
}

impl ToolSession {
    pub fn new(feature: Feature, gate: EntitlementGate, reporter: Arc<DiagnosticReporter>) -> Self {
        Self {
            feature,
            gate,
            reporter,
            busy: BusyFlag::new(),
            documents: Vec::new(),
            images: Vec::new(),
            selection: None,
            rotation: RotationAngle::Quarter,
        }
    }

    /// Share one busy flag across sessions
    pub fn with_busy_flag(mut self, busy: BusyFlag) -> Self {
        self.busy = busy;
        self
    }

    pub fn feature(&self) -> Feature {
        self.feature
    }

    pub fn busy_flag(&self) -> BusyFlag {
        self.busy.clone()
    }

    fn uses_selection(&self) -> bool {
        matches!(self.feature, Feature::SplitPdfPages | Feature::DeletePages)
    }

    fn screen(&self) -> &'static str {
        match self.feature {
            Feature::ImagesToPdf => "ImageToPdf",
            Feature::PdfToImages => "PdfToImage",
            Feature::MergePdfs => "MergePdf",
            Feature::SplitPdfPages => "SplitPdf",
            Feature::CompressPdf => "CompressPdf",
            Feature::RotatePdf => "RotatePdf",
            Feature::DeletePages => "DeletePages",
        }
    }

    fn limit_exceeded(&self, limit: usize) -> ToolError {
        ToolError::LimitExceeded {
            feature: self.feature,
            limit: u32::try_from(limit).unwrap_or(u32::MAX),
        }
    }

    // ---- documents ----

    /// Load a PDF into the session
    ///
    /// Merge sessions collect documents up to the per-job cap; every other
    /// PDF tool works on one document, which a new one replaces.
    pub fn add_document(&mut self, name: &str, bytes: Vec<u8>) -> Result<PdfInfo, ToolError> {
        if self.feature == Feature::ImagesToPdf {
            return Err(ToolError::SourceUnavailable(
                "This tool takes images, not PDFs".into(),
            ));
        }

        if self.feature == Feature::MergePdfs {
            if let Some(cap) = self.gate.per_job_cap(self.feature) {
                if self.documents.len() >= cap {
                    return Err(self.limit_exceeded(cap));
                }
            }
        }

        let info = validate_pdf(&bytes)?;
        let entry = DocumentEntry {
            name: name.to_string(),
            bytes,
            info: info.clone(),
        };

        if self.feature == Feature::MergePdfs {
            self.documents.push(entry);
        } else {
            self.documents = vec![entry];
            if self.uses_selection() {
                self.selection = Some(PageSelection::new(
                    info.page_count,
                    self.gate.per_job_cap(self.feature),
                ));
            }
        }

        debug!(name, pages = info.page_count, "document added");
        Ok(info)
    }

    pub fn remove_document(&mut self, index: usize) -> Result<(), ToolError> {
        if index >= self.documents.len() {
            return Err(ToolError::SourceUnavailable(
                "Document index out of bounds".into(),
            ));
        }
        self.documents.remove(index);

        if self.documents.is_empty() {
            self.selection = None;
        }
        Ok(())
    }

    /// Reorder documents; `new_order` lists current indices in the desired order
    pub fn reorder_documents(&mut self, new_order: &[usize]) -> Result<(), ToolError> {
        let invalid = |why: &str| ToolError::SourceUnavailable(format!("Invalid order: {}", why));

        if new_order.len() != self.documents.len() {
            return Err(invalid("wrong number of indices"));
        }

        let mut seen = vec![false; self.documents.len()];
        for &idx in new_order {
            if idx >= self.documents.len() {
                return Err(invalid("index out of bounds"));
            }
            if seen[idx] {
                return Err(invalid("duplicate index"));
            }
            seen[idx] = true;
        }

        let mut slots: Vec<Option<DocumentEntry>> =
            self.documents.drain(..).map(Some).collect();
        self.documents = new_order
            .iter()
            .filter_map(|&idx| slots[idx].take())
            .collect();
        Ok(())
    }

    /// Move one document up or down the merge order
    pub fn move_document(&mut self, from: usize, to: usize) -> Result<(), ToolError> {
        if from >= self.documents.len() || to >= self.documents.len() {
            return Err(ToolError::SourceUnavailable(
                "Document index out of bounds".into(),
            ));
        }
        let entry = self.documents.remove(from);
        self.documents.insert(to, entry);
        Ok(())
    }

    pub fn documents(&self) -> Vec<DocumentSummary> {
        self.documents
            .iter()
            .map(|d| DocumentSummary {
                name: d.name.clone(),
                page_count: d.info.page_count,
                size_bytes: d.bytes.len(),
                version: d.info.version.clone(),
            })
            .collect()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn total_page_count(&self) -> u32 {
        self.documents.iter().map(|d| d.info.page_count).sum()
    }

    // ---- images ----

    /// Append images, keeping only as many as the free tier allows
    pub fn add_images(&mut self, images: Vec<(String, Vec<u8>)>) -> Result<ImagesAdded, ToolError> {
        if self.feature != Feature::ImagesToPdf {
            return Err(ToolError::SourceUnavailable(
                "This tool takes PDFs, not images".into(),
            ));
        }

        for (name, bytes) in &images {
            if detect_format(bytes).is_none() {
                return Err(ToolError::SourceUnavailable(format!(
                    "{} is not a JPEG or PNG image",
                    name
                )));
            }
        }

        let before = self.images.len();
        self.images.extend(
            images
                .into_iter()
                .map(|(name, bytes)| ImageEntry { name, bytes }),
        );

        let mut truncated = false;
        if let Some(cap) = self.gate.per_job_cap(self.feature) {
            if self.images.len() > cap {
                self.images.truncate(cap);
                truncated = true;
            }
        }

        let added = self.images.len().saturating_sub(before);
        debug!(added, truncated, "images added");
        Ok(ImagesAdded { added, truncated })
    }

    pub fn remove_image(&mut self, index: usize) -> Result<(), ToolError> {
        if index >= self.images.len() {
            return Err(ToolError::SourceUnavailable(
                "Image index out of bounds".into(),
            ));
        }
        self.images.remove(index);
        Ok(())
    }

    pub fn image_names(&self) -> Vec<String> {
        self.images.iter().map(|i| i.name.clone()).collect()
    }

    // ---- selection ----

    fn selection_mut(&mut self) -> Result<&mut PageSelection, ToolError> {
        self.selection
            .as_mut()
            .ok_or_else(|| ToolError::SourceUnavailable("Please select a PDF first".into()))
    }

    pub fn selection(&self) -> Option<&PageSelection> {
        self.selection.as_ref()
    }

    pub fn selected_pages(&self) -> Vec<u32> {
        self.selection
            .as_ref()
            .map(PageSelection::pages)
            .unwrap_or_default()
    }

    pub fn toggle_page(&mut self, page: u32) -> Result<bool, ToolError> {
        let feature = self.feature;
        self.selection_mut()?
            .toggle(page)
            .map_err(|e| ToolError::from_selection(feature, e))
    }

    pub fn select_all(&mut self) -> Result<SelectAll, ToolError> {
        Ok(self.selection_mut()?.select_all())
    }

    pub fn deselect_all(&mut self) -> Result<(), ToolError> {
        self.selection_mut()?.deselect_all();
        Ok(())
    }

    /// Input: "1-3, 5, 8-10" format
    pub fn set_page_selection(&mut self, ranges: &str) -> Result<(), ToolError> {
        let feature = self.feature;
        self.selection_mut()?
            .set_from_ranges(ranges)
            .map_err(|e| ToolError::from_selection(feature, e))
    }

    pub fn set_rotation(&mut self, angle: RotationAngle) {
        self.rotation = angle;
    }

    pub fn rotation(&self) -> RotationAngle {
        self.rotation
    }

    // ---- execution ----

    fn single_document(&self) -> Result<&DocumentEntry, ToolError> {
        self.documents
            .first()
            .ok_or_else(|| ToolError::SourceUnavailable("Please select a PDF first".into()))
    }

    fn selection_for_job(&self) -> Result<&PageSelection, ToolError> {
        let selection = self
            .selection
            .as_ref()
            .ok_or_else(|| ToolError::SourceUnavailable("Please select a PDF first".into()))?;

        // The tier may have changed since the selection was made
        if let Some(cap) = self.gate.per_job_cap(self.feature) {
            if selection.len() > cap {
                return Err(self.limit_exceeded(cap));
            }
        }
        Ok(selection)
    }

    /// The edit the current inputs describe
    pub fn build_job(&self) -> Result<EditJob, ToolError> {
        let cap = self.gate.per_job_cap(self.feature);

        let job = match self.feature {
            Feature::DeletePages => {
                let selection = self.selection_for_job()?;
                selection.validate_for_delete()?;
                EditJob::DeletePages {
                    file: self.single_document()?.bytes.clone(),
                    pages: selection.pages(),
                }
            }
            Feature::SplitPdfPages => {
                let selection = self.selection_for_job()?;
                selection.validate_for_extract()?;
                EditJob::Split {
                    file: self.single_document()?.bytes.clone(),
                    pages: selection.pages(),
                }
            }
            Feature::RotatePdf => EditJob::Rotate {
                file: self.single_document()?.bytes.clone(),
                angle: self.rotation,
            },
            Feature::CompressPdf => EditJob::Compress {
                file: self.single_document()?.bytes.clone(),
            },
            Feature::MergePdfs => {
                if self.documents.len() < MERGE_MINIMUM {
                    return Err(SelectionError::NotEnoughDocuments {
                        required: MERGE_MINIMUM,
                        got: self.documents.len(),
                    }
                    .into());
                }
                if let Some(cap) = cap.filter(|&cap| self.documents.len() > cap) {
                    return Err(self.limit_exceeded(cap));
                }
                EditJob::Merge {
                    files: self.documents.iter().map(|d| d.bytes.clone()).collect(),
                }
            }
            Feature::ImagesToPdf => {
                if self.images.is_empty() {
                    return Err(ToolError::SourceUnavailable(
                        "Please add images first".into(),
                    ));
                }
                if let Some(cap) = cap.filter(|&cap| self.images.len() > cap) {
                    return Err(self.limit_exceeded(cap));
                }
                EditJob::ImagesToPdf {
                    images: self.images.iter().map(|i| i.bytes.clone()).collect(),
                }
            }
            Feature::PdfToImages => {
                return Err(ToolError::SourceUnavailable(
                    "PDF to images runs through a page renderer".into(),
                ))
            }
        };
        Ok(job)
    }

    fn report_context(&self) -> Value {
        json!({
            "screen": self.screen(),
            "documents": self.documents.len(),
            "images": self.images.len(),
            "selectedPages": self.selected_pages().len(),
        })
    }

    /// Check the quota before any work starts
    fn admit(&self) -> Result<(), ToolError> {
        self.gate.roll_over(Local::now().date_naive());
        self.gate.ensure_allowed(self.feature)?;
        Ok(())
    }

    /// Record the use; a storage failure is logged and does not fail the job
    fn record_use(&self) {
        if let Err(e) = self.gate.record_use(self.feature) {
            warn!(feature = %self.feature, error = %e, "could not record usage");
        }
    }

    /// Run the edit for the current inputs
    pub fn execute(&mut self) -> Result<JobReport, ToolError> {
        let _token = self.busy.try_start()?;
        self.admit()?;
        let job = self.build_job()?;

        let outcome = match pdfedit_core::execute(job) {
            Ok(outcome) => outcome,
            Err(e) => {
                let receipt = self.reporter.report(&e, self.report_context());
                warn!(feature = %self.feature, id = %receipt.id, error = %e, "edit failed");
                return Err(ToolError::EditFailed {
                    correlation_id: receipt.id,
                    source: Box::new(e),
                });
            }
        };

        self.record_use();
        let message = self.success_message(&outcome);
        info!(feature = %self.feature, "{}", message);

        Ok(JobReport { outcome, message })
    }

    fn success_message(&self, outcome: &EditOutcome) -> String {
        match self.feature {
            Feature::DeletePages => format!(
                "Deleted {} page(s). New PDF has {} pages.",
                self.selected_pages().len(),
                outcome.metrics.page_count
            ),
            Feature::SplitPdfPages => format!(
                "Extracted {} page(s) successfully",
                outcome.metrics.page_count
            ),
            Feature::RotatePdf => format!("PDF rotated {} successfully", self.rotation),
            Feature::MergePdfs => "PDFs merged successfully".to_string(),
            Feature::ImagesToPdf => "PDF created successfully".to_string(),
            Feature::CompressPdf => match &outcome.compression {
                Some(report) if !report.already_optimized() => format!(
                    "Compressed by {}% ({} saved)",
                    report.saved_percent,
                    pdfedit_core::format_file_size(report.saved_bytes.unsigned_abs())
                ),
                _ => "This PDF is already optimized".to_string(),
            },
            Feature::PdfToImages => String::new(),
        }
    }

    /// Render the source PDF's pages to images
    ///
    /// Free-tier conversions keep only the first pages up to the cap; the
    /// extra images are deleted.
    pub fn convert_to_images(
        &mut self,
        rasterizer: &dyn PageRasterizer,
        source: &SourceLocation,
        options: &RasterOptions,
    ) -> Result<ConversionReport, ToolError> {
        if self.feature != Feature::PdfToImages {
            return Err(ToolError::SourceUnavailable(
                "This tool does not render pages".into(),
            ));
        }

        let _token = self.busy.try_start()?;
        self.admit()?;

        let mut images = match rasterizer.convert(source, options) {
            Ok(images) => images,
            Err(RasterError::SourceNotFound(msg)) | Err(RasterError::PermissionRequired(msg)) => {
                return Err(ToolError::SourceUnavailable(msg))
            }
            Err(e) => {
                let receipt = self.reporter.report(&e, self.report_context());
                warn!(id = %receipt.id, error = %e, "page rendering failed");
                return Err(ToolError::EditFailed {
                    correlation_id: receipt.id,
                    source: Box::new(e),
                });
            }
        };

        let mut truncated = false;
        if let Some(cap) = self.gate.per_job_cap(self.feature) {
            if images.len() > cap {
                for extra in images.drain(cap..) {
                    if let Err(e) = fs::remove_file(&extra) {
                        warn!(path = %extra.display(), error = %e, "could not remove extra page image");
                    }
                }
                truncated = true;
            }
        }

        self.record_use();
        info!(images = images.len(), truncated, "pages rendered");
        Ok(ConversionReport { images, truncated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_pdf, jpeg_bytes};
    use pdfedit_core::PlaceholderRasterizer;
    use pretty_assertions::assert_eq;
    use quota_core::{MemoryStore, UsageLedger, UNLIMITED};

    fn services() -> (EntitlementGate, Arc<DiagnosticReporter>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ledger = UsageLedger::load(store.clone(), Local::now().date_naive());
        let reporter = Arc::new(DiagnosticReporter::new(store.clone()));
        (EntitlementGate::new(ledger), reporter, store)
    }

    fn session(feature: Feature) -> ToolSession {
        let (gate, reporter, _) = services();
        ToolSession::new(feature, gate, reporter)
    }

    #[test]
    fn test_new_session_is_empty() {
        let session = session(Feature::MergePdfs);
        assert_eq!(session.document_count(), 0);
        assert_eq!(session.total_page_count(), 0);
        assert!(session.selection().is_none());
    }

    #[test]
    fn test_delete_flow_records_one_use() {
        let (gate, reporter, _) = services();
        let mut session = ToolSession::new(Feature::DeletePages, gate.clone(), reporter);
        session.add_document("doc.pdf", create_test_pdf(5)).unwrap();
        session.toggle_page(2).unwrap();
        session.toggle_page(4).unwrap();

        let report = session.execute().unwrap();
        assert_eq!(report.outcome.metrics.page_count, 3);
        assert_eq!(report.message, "Deleted 2 page(s). New PDF has 3 pages.");
        assert_eq!(gate.remaining(Feature::DeletePages), 4);
    }

    #[test]
    fn test_delete_all_pages_rejected_without_use() {
        let (gate, reporter, _) = services();
        let mut session = ToolSession::new(Feature::DeletePages, gate.clone(), reporter);
        session.add_document("doc.pdf", create_test_pdf(3)).unwrap();
        session.select_all().unwrap();

        assert!(matches!(
            session.execute(),
            Err(ToolError::InvalidSelection(SelectionError::WouldDeleteAll))
        ));
        assert_eq!(gate.remaining(Feature::DeletePages), 5);
    }

    #[test]
    fn test_free_toggle_beyond_cap_is_limit_exceeded() {
        let mut session = session(Feature::DeletePages);
        session.add_document("doc.pdf", create_test_pdf(10)).unwrap();
        for page in 1..=5 {
            session.toggle_page(page).unwrap();
        }
        assert!(matches!(
            session.toggle_page(6),
            Err(ToolError::LimitExceeded {
                feature: Feature::DeletePages,
                limit: 5
            })
        ));
        assert_eq!(session.selected_pages(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_split_with_range_selection() {
        let mut session = session(Feature::SplitPdfPages);
        session.add_document("doc.pdf", create_test_pdf(8)).unwrap();
        session.set_page_selection("2-3, 7").unwrap();

        let report = session.execute().unwrap();
        assert_eq!(report.outcome.metrics.page_count, 3);
    }

    #[test]
    fn test_split_without_selection() {
        let mut session = session(Feature::SplitPdfPages);
        session.add_document("doc.pdf", create_test_pdf(3)).unwrap();
        assert!(matches!(
            session.execute(),
            Err(ToolError::InvalidSelection(SelectionError::NoSelection))
        ));
    }

    #[test]
    fn test_daily_limit_blocks_execution() {
        let (gate, reporter, _) = services();
        let mut session = ToolSession::new(Feature::RotatePdf, gate.clone(), reporter);
        session.add_document("doc.pdf", create_test_pdf(2)).unwrap();
        session.set_rotation(RotationAngle::Half);

        for _ in 0..3 {
            session.execute().unwrap();
        }
        assert!(matches!(
            session.execute(),
            Err(ToolError::LimitExceeded {
                feature: Feature::RotatePdf,
                limit: 3
            })
        ));
    }

    #[test]
    fn test_merge_requires_two_documents() {
        let mut session = session(Feature::MergePdfs);
        session.add_document("a.pdf", create_test_pdf(1)).unwrap();
        assert!(matches!(
            session.execute(),
            Err(ToolError::InvalidSelection(
                SelectionError::NotEnoughDocuments {
                    required: 2,
                    got: 1
                }
            ))
        ));
    }

    #[test]
    fn test_free_merge_caps_document_count() {
        let mut session = session(Feature::MergePdfs);
        session.add_document("a.pdf", create_test_pdf(1)).unwrap();
        session.add_document("b.pdf", create_test_pdf(2)).unwrap();
        assert!(matches!(
            session.add_document("c.pdf", create_test_pdf(1)),
            Err(ToolError::LimitExceeded { limit: 2, .. })
        ));

        let report = session.execute().unwrap();
        assert_eq!(report.outcome.metrics.page_count, 3);
    }

    #[test]
    fn test_pro_merge_is_uncapped() {
        let (gate, reporter, _) = services();
        gate.set_pro(true).unwrap();
        let mut session = ToolSession::new(Feature::MergePdfs, gate.clone(), reporter);
        for i in 0..4 {
            session
                .add_document(&format!("{}.pdf", i), create_test_pdf(1))
                .unwrap();
        }
        session.execute().unwrap();
        assert_eq!(gate.remaining(Feature::MergePdfs), UNLIMITED);
    }

    #[test]
    fn test_reorder_documents() {
        let mut session = session(Feature::MergePdfs);
        session.add_document("a.pdf", create_test_pdf(1)).unwrap();
        session.add_document("b.pdf", create_test_pdf(2)).unwrap();

        session.reorder_documents(&[1, 0]).unwrap();
        let names: Vec<String> = session.documents().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["b.pdf", "a.pdf"]);

        assert!(session.reorder_documents(&[0, 0]).is_err());
        assert!(session.reorder_documents(&[0]).is_err());
    }

    #[test]
    fn test_move_and_remove_document() {
        let (gate, reporter, _) = services();
        gate.set_pro(true).unwrap();
        let mut session = ToolSession::new(Feature::MergePdfs, gate, reporter);
        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            session.add_document(name, create_test_pdf(1)).unwrap();
        }

        session.move_document(2, 0).unwrap();
        session.remove_document(1).unwrap();
        let names: Vec<String> = session.documents().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["c.pdf", "b.pdf"]);
        assert!(session.remove_document(5).is_err());
    }

    #[test]
    fn test_single_document_tools_replace_document() {
        let mut session = session(Feature::CompressPdf);
        session.add_document("a.pdf", create_test_pdf(1)).unwrap();
        session.add_document("b.pdf", create_test_pdf(4)).unwrap();
        assert_eq!(session.document_count(), 1);
        assert_eq!(session.total_page_count(), 4);
    }

    #[test]
    fn test_invalid_pdf_is_source_unavailable() {
        let mut session = session(Feature::RotatePdf);
        assert!(matches!(
            session.add_document("bad.pdf", b"not a valid pdf".to_vec()),
            Err(ToolError::SourceUnavailable(_))
        ));
    }

    #[test]
    fn test_free_images_are_truncated_to_cap() {
        let mut session = session(Feature::ImagesToPdf);
        let images = (0..7)
            .map(|i| (format!("{}.jpg", i), jpeg_bytes(20, 10)))
            .collect();

        let added = session.add_images(images).unwrap();
        assert_eq!(
            added,
            ImagesAdded {
                added: 5,
                truncated: true
            }
        );

        let report = session.execute().unwrap();
        assert_eq!(report.outcome.metrics.page_count, 5);
    }

    #[test]
    fn test_images_reject_unknown_format() {
        let mut session = session(Feature::ImagesToPdf);
        let result = session.add_images(vec![("a.gif".into(), b"GIF89a....".to_vec())]);
        assert!(matches!(result, Err(ToolError::SourceUnavailable(_))));
        assert!(session.image_names().is_empty());
    }

    #[test]
    fn test_busy_session_rejects_second_job() {
        let mut session = session(Feature::CompressPdf);
        session.add_document("a.pdf", create_test_pdf(1)).unwrap();

        let busy = session.busy_flag();
        let token = busy.try_start().unwrap();
        assert!(matches!(session.execute(), Err(ToolError::Busy)));
        drop(token);

        session.execute().unwrap();
        assert!(!busy.is_busy());
    }

    #[test]
    fn test_storage_failure_does_not_fail_job() {
        let (gate, reporter, store) = services();
        let mut session = ToolSession::new(Feature::CompressPdf, gate.clone(), reporter);
        session.add_document("a.pdf", create_test_pdf(2)).unwrap();

        store.set_unavailable(true);
        let report = session.execute().unwrap();
        assert_eq!(report.outcome.metrics.page_count, 2);
        // Increment was not applied because the write failed
        assert_eq!(gate.remaining(Feature::CompressPdf), 3);
    }

    #[test]
    fn test_convert_to_images_truncates_free_tier() {
        let dir = tempfile::tempdir().unwrap();
        let pdf_path = dir.path().join("in.pdf");
        fs::write(&pdf_path, create_test_pdf(5)).unwrap();

        let (gate, reporter, _) = services();
        let mut session = ToolSession::new(Feature::PdfToImages, gate.clone(), reporter);
        let rasterizer = PlaceholderRasterizer::new(dir.path());

        let report = session
            .convert_to_images(
                &rasterizer,
                &SourceLocation::File(pdf_path),
                &RasterOptions::default(),
            )
            .unwrap();

        assert!(report.truncated);
        assert_eq!(report.images.len(), 3);
        assert!(report.images.iter().all(|p| p.exists()));
        assert_eq!(gate.remaining(Feature::PdfToImages), 2);
    }

    /// Reports page images that were never written to disk
    struct VanishingRasterizer(PathBuf);

    impl PageRasterizer for VanishingRasterizer {
        fn convert(
            &self,
            _source: &SourceLocation,
            _options: &RasterOptions,
        ) -> Result<Vec<PathBuf>, RasterError> {
            Ok((1..=5)
                .map(|n| self.0.join(format!("page_{}.png", n)))
                .collect())
        }
    }

    #[test]
    fn test_convert_truncation_tolerates_missing_extra_files() {
        let dir = tempfile::tempdir().unwrap();
        let (gate, reporter, _) = services();
        let mut session = ToolSession::new(Feature::PdfToImages, gate.clone(), reporter);

        let report = session
            .convert_to_images(
                &VanishingRasterizer(dir.path().to_path_buf()),
                &SourceLocation::File(dir.path().join("in.pdf")),
                &RasterOptions::default(),
            )
            .unwrap();

        assert!(report.truncated);
        assert_eq!(report.images.len(), 3);
        assert_eq!(gate.remaining(Feature::PdfToImages), 2);
    }

    #[test]
    fn test_convert_missing_source_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(Feature::PdfToImages);
        let rasterizer = PlaceholderRasterizer::new(dir.path());

        let result = session.convert_to_images(
            &rasterizer,
            &SourceLocation::File(dir.path().join("missing.pdf")),
            &RasterOptions::default(),
        );
        assert!(matches!(result, Err(ToolError::SourceUnavailable(_))));
    }

    #[test]
    fn test_render_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let pdf_path = dir.path().join("broken.pdf");
        fs::write(&pdf_path, b"%PDF-1.7 but nothing else").unwrap();

        let (gate, reporter, _) = services();
        let mut session = ToolSession::new(Feature::PdfToImages, gate, reporter.clone());
        let rasterizer = PlaceholderRasterizer::new(dir.path());

        let err = session
            .convert_to_images(
                &rasterizer,
                &SourceLocation::File(pdf_path),
                &RasterOptions::default(),
            )
            .unwrap_err();

        match err {
            ToolError::EditFailed { correlation_id, .. } => {
                let stored = reporter.stored();
                assert_eq!(stored.len(), 1);
                assert_eq!(stored[0].id, correlation_id);
                assert_eq!(stored[0].context["screen"], "PdfToImage");
            }
            other => panic!("expected EditFailed, got {:?}", other),
        }
    }
}
