//! pdftools command-line host
//!
//! Runs the PDF tools against local files with the same free-tier limits,
//! usage accounting and error reporting as the app screens.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use quota_core::ThemePreference;
use tracing::{debug, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;

use commands::App;
use config::Config;

/// Command-line arguments for pdftools
#[derive(Parser, Debug)]
#[command(name = "pdftools")]
#[command(about = "Merge, split, rotate, compress and convert PDFs")]
struct Args {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for persisted state (overrides the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge PDFs in the order given
    Merge {
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Extract pages into a new PDF
    Split {
        input: PathBuf,
        /// Pages to keep, e.g. "1-3, 5"
        #[arg(short, long)]
        pages: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Delete pages from a PDF
    Delete {
        input: PathBuf,
        /// Pages to delete, e.g. "2, 4-6"
        #[arg(short, long)]
        pages: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Rotate every page clockwise
    Rotate {
        input: PathBuf,
        /// 90, 180 or 270
        #[arg(short, long, default_value_t = 90)]
        angle: i64,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Shrink a PDF
    Compress {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Build a PDF from JPEG/PNG images, one page each
    Images {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Render PDF pages to PNG images
    ToImages {
        /// Path, file:// URI or content:// reference
        input: String,
        #[arg(long)]
        out_dir: PathBuf,
        /// Longest side in pixels (overrides the config file)
        #[arg(long)]
        max_dim: Option<u32>,
    },
    /// Show today's usage
    Usage {
        /// Zero today's counters
        #[arg(long)]
        reset: bool,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change the pro entitlement
    Pro { state: Option<Switch> },
    /// Show or change the theme preference
    Theme { value: Option<ThemePreference> },
    /// Inspect stored error reports
    Logs {
        #[command(subcommand)]
        action: LogsAction,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Switch {
    On,
    Off,
}

#[derive(Subcommand, Debug)]
enum LogsAction {
    /// Print stored reports as JSON
    Show,
    /// Upload stored reports to the collector
    Flush,
    /// Delete stored reports
    Clear,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    debug!(?config, "configuration loaded");

    let app = App::init(config)?;

    match args.command {
        Command::Merge { inputs, output } => app.merge(&inputs, &output),
        Command::Split {
            input,
            pages,
            output,
        } => app.split(&input, &pages, &output),
        Command::Delete {
            input,
            pages,
            output,
        } => app.delete(&input, &pages, &output),
        Command::Rotate {
            input,
            angle,
            output,
        } => app.rotate(&input, angle, &output),
        Command::Compress { input, output } => app.compress(&input, &output),
        Command::Images { inputs, output } => app.images(&inputs, &output),
        Command::ToImages {
            input,
            out_dir,
            max_dim,
        } => app.to_images(&input, &out_dir, max_dim),
        Command::Usage { reset, json } => app.usage(reset, json),
        Command::Pro { state } => app.pro(state.map(|s| s == Switch::On)),
        Command::Theme { value } => app.theme(value),
        Command::Logs { action } => match action {
            LogsAction::Show => app.logs_show(),
            LogsAction::Flush => app.logs_flush(),
            LogsAction::Clear => app.logs_clear(),
        },
    }
}
