//! Subcommand implementations
//!
//! Each edit command runs through a [`ToolSession`], so the free-tier
//! checks and usage accounting match the app. Outputs are written only
//! after the edit succeeded.

use crate::config::Config;
use anyhow::{bail, Context};
use chrono::Local;
use pdfedit_core::{
    format_file_size, PlaceholderRasterizer, RasterOptions, RotationAngle, SourceLocation,
};
use pdftools_session::{
    DiagnosticReporter, FlushOutcome, HttpUploader, JobReport, ToolError, ToolSession,
};
use quota_core::{
    read_json, EntitlementGate, Feature, JsonFileStore, ThemePreference, UsageLedger,
    PRO_FEATURES, THEME_KEY,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Services wired up once per run
pub struct App {
    config: Config,
    store: Arc<JsonFileStore>,
    gate: EntitlementGate,
    reporter: Arc<DiagnosticReporter>,
}

/// Keep the short user-facing text on top of the full error chain
fn user_facing(e: ToolError) -> anyhow::Error {
    let message = e.user_message();
    anyhow::Error::new(e).context(message)
}

fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Write through a temp file in the destination directory, then rename
fn write_output(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let tmp = path.with_file_name(format!(".{}.tmp", file_name(path)));
    fs::write(&tmp, bytes).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to move output to {}", path.display()))
}

impl App {
    pub fn init(config: Config) -> anyhow::Result<Self> {
        let store = Arc::new(
            JsonFileStore::open(config.state_path()).context("Failed to open state store")?,
        );

        let ledger = UsageLedger::load(store.clone(), Local::now().date_naive());
        let gate = EntitlementGate::new(ledger);

        let mut reporter = DiagnosticReporter::new(store.clone());
        if let Some(url) = config.collector() {
            match HttpUploader::new(url) {
                Ok(uploader) => reporter = reporter.with_uploader(Box::new(uploader)),
                Err(e) => warn!(error = %e, "log collector unavailable, storing reports locally"),
            }
        }

        if let Some(theme) = config.theme {
            let saved: Option<ThemePreference> = read_json(&*store, THEME_KEY).unwrap_or(None);
            if saved.is_none() {
                if let Err(e) = theme.save(&*store) {
                    warn!(error = %e, "could not apply configured theme");
                }
            }
        }

        Ok(Self {
            config,
            store,
            gate,
            reporter: Arc::new(reporter),
        })
    }

    fn session(&self, feature: Feature) -> ToolSession {
        ToolSession::new(feature, self.gate.clone(), Arc::clone(&self.reporter))
    }

    fn finish(&self, report: JobReport, output: &Path) -> anyhow::Result<()> {
        write_output(output, &report.outcome.bytes)?;
        println!("{}", report.message);
        println!(
            "Wrote {} ({} pages, {})",
            output.display(),
            report.outcome.metrics.page_count,
            format_file_size(report.outcome.metrics.output_size_bytes as u64)
        );
        Ok(())
    }

    fn load_single(&self, feature: Feature, input: &Path) -> anyhow::Result<ToolSession> {
        let mut session = self.session(feature);
        session
            .add_document(&file_name(input), read_input(input)?)
            .map_err(user_facing)?;
        Ok(session)
    }

    pub fn merge(&self, inputs: &[PathBuf], output: &Path) -> anyhow::Result<()> {
        let mut session = self.session(Feature::MergePdfs);
        for input in inputs {
            session
                .add_document(&file_name(input), read_input(input)?)
                .map_err(user_facing)?;
        }
        let report = session.execute().map_err(user_facing)?;
        self.finish(report, output)
    }

    pub fn split(&self, input: &Path, pages: &str, output: &Path) -> anyhow::Result<()> {
        let mut session = self.load_single(Feature::SplitPdfPages, input)?;
        session.set_page_selection(pages).map_err(user_facing)?;
        let report = session.execute().map_err(user_facing)?;
        self.finish(report, output)
    }

    pub fn delete(&self, input: &Path, pages: &str, output: &Path) -> anyhow::Result<()> {
        let mut session = self.load_single(Feature::DeletePages, input)?;
        session.set_page_selection(pages).map_err(user_facing)?;
        let report = session.execute().map_err(user_facing)?;
        self.finish(report, output)
    }

    pub fn rotate(&self, input: &Path, angle: i64, output: &Path) -> anyhow::Result<()> {
        let angle = RotationAngle::try_from(angle)?;
        let mut session = self.load_single(Feature::RotatePdf, input)?;
        session.set_rotation(angle);
        let report = session.execute().map_err(user_facing)?;
        self.finish(report, output)
    }

    pub fn compress(&self, input: &Path, output: &Path) -> anyhow::Result<()> {
        let mut session = self.load_single(Feature::CompressPdf, input)?;
        let report = session.execute().map_err(user_facing)?;
        self.finish(report, output)
    }

    pub fn images(&self, inputs: &[PathBuf], output: &Path) -> anyhow::Result<()> {
        let mut session = self.session(Feature::ImagesToPdf);
        let images = inputs
            .iter()
            .map(|path| Ok((file_name(path), read_input(path)?)))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let added = session.add_images(images).map_err(user_facing)?;
        if added.truncated {
            println!(
                "Free users can only add up to {} images. Using the first {}.",
                Feature::ImagesToPdf.limit(),
                added.added
            );
        }

        let report = session.execute().map_err(user_facing)?;
        self.finish(report, output)
    }

    pub fn to_images(&self, input: &str, out_dir: &Path, max_dim: Option<u32>) -> anyhow::Result<()> {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("Failed to create {}", out_dir.display()))?;

        let options = RasterOptions {
            max_dim: max_dim.unwrap_or(self.config.max_dim),
        };
        let rasterizer = PlaceholderRasterizer::new(out_dir);
        let source = SourceLocation::parse(input);

        let mut session = self.session(Feature::PdfToImages);
        let report = session
            .convert_to_images(&rasterizer, &source, &options)
            .map_err(user_facing)?;

        for image in &report.images {
            println!("{}", image.display());
        }
        if report.truncated {
            println!(
                "Free users can convert up to {} pages. Upgrade to Pro to convert all pages.",
                Feature::PdfToImages.limit()
            );
        }
        Ok(())
    }

    pub fn usage(&self, reset: bool, json: bool) -> anyhow::Result<()> {
        if reset {
            self.gate.reset()?;
            info!("usage counters reset");
        }

        let summary = self.gate.summary();
        if json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            return Ok(());
        }

        let tier = if self.gate.is_pro() { "Pro" } else { "Free" };
        println!("Tier: {}", tier);
        for row in summary {
            let remaining = if row.remaining < 0 {
                "unlimited".to_string()
            } else {
                row.remaining.to_string()
            };
            println!(
                "{:<16} used {:>2} / {:<2} remaining {}",
                row.feature.label(),
                row.used,
                row.limit,
                remaining
            );
        }
        Ok(())
    }

    pub fn pro(&self, state: Option<bool>) -> anyhow::Result<()> {
        if let Some(value) = state {
            self.gate.set_pro(value)?;
        }

        if self.gate.is_pro() {
            println!("Pro is active. Unlocked:");
            for feature in PRO_FEATURES {
                println!("  - {}", feature);
            }
        } else {
            println!("Free tier. Run `pdftools pro on` to unlock everything.");
        }
        Ok(())
    }

    pub fn theme(&self, value: Option<ThemePreference>) -> anyhow::Result<()> {
        let theme = match value {
            Some(theme) => {
                theme.save(&*self.store)?;
                theme
            }
            None => ThemePreference::load(&*self.store),
        };
        println!("{}", theme);
        Ok(())
    }

    pub fn logs_show(&self) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(&self.reporter.stored())?);
        Ok(())
    }

    pub fn logs_flush(&self) -> anyhow::Result<()> {
        match self.reporter.flush() {
            FlushOutcome::NoEndpoint => bail!("No log collector configured (set collector_url)"),
            FlushOutcome::Unreadable => bail!("Stored reports could not be read; nothing was sent"),
            FlushOutcome::Flushed {
                uploaded,
                remaining,
            } => println!("Uploaded {}, {} still stored", uploaded, remaining),
        }
        Ok(())
    }

    pub fn logs_clear(&self) -> anyhow::Result<()> {
        self.reporter.clear()?;
        println!("Stored reports cleared");
        Ok(())
    }
}
