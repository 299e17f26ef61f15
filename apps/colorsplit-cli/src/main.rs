//! colorsplit binary
//!
//! Splits the given PDFs into a color document and a black & white document.

mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use colorsplit_core::{PdfiumRasterizer, ProgressEvent, RunOutcome, SplitPipeline};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "colorsplit")]
#[command(
    version,
    about = "Split PDFs into a color document and a black & white document"
)]
struct Args {
    /// Input PDF files, processed in the given order
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Sensitivity from 10 (more pages count as color) to 100 (fewer)
    #[arg(short, long)]
    threshold: Option<u32>,

    /// Insert a blank page between the pages of consecutive input files
    #[arg(short, long)]
    separators: bool,

    /// Directory for the output PDFs
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the run report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Log every page classification
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(threshold) = args.threshold {
        config.split.threshold = threshold;
    }
    if args.separators {
        config.split.insert_separators = true;
    }
    if let Some(dir) = args.out_dir {
        config.output.directory = dir;
    }
    if let Some(report) = args.report {
        config.output.report_file = Some(report);
    }

    let options = config.split_options()?;
    let rasterizer = PdfiumRasterizer::new().context("Failed to initialize the PDF renderer")?;

    let output = SplitPipeline::new(&rasterizer, options)
        .on_progress(|event| match event {
            ProgressEvent::FileStarted {
                file_index,
                file_count,
                name,
            } => tracing::info!("[{}/{}] {}", file_index + 1, file_count, name),
            ProgressEvent::PageProcessed {
                page_index,
                page_count,
                ..
            } => tracing::debug!("  page {}/{}", page_index + 1, page_count),
            ProgressEvent::Finalizing => tracing::info!("Writing output documents"),
        })
        .run(&args.files);

    std::fs::create_dir_all(&config.output.directory).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            config.output.directory.display()
        )
    })?;

    for (bytes, path, label) in [
        (&output.color, config.color_path(), "Color"),
        (&output.black_and_white, config.bw_path(), "Black & white"),
    ] {
        if write_output(&path, bytes.as_deref())? {
            println!("{}: {}", label, path.display());
        }
    }

    if let Some(path) = &config.output.report_file {
        let json = serde_json::to_string_pretty(&output.report)
            .context("Failed to serialize run report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
    }

    let report = &output.report;
    println!(
        "{} color page(s), {} black & white page(s)",
        report.color_pages, report.bw_pages
    );
    if report.render_fallbacks() > 0 {
        println!(
            "{} page(s) could not be rendered and were treated as black & white",
            report.render_fallbacks()
        );
    }
    for diagnostic in &report.diagnostics {
        eprintln!("warning: {}", diagnostic);
    }

    match output.outcome {
        RunOutcome::Completed => Ok(ExitCode::SUCCESS),
        RunOutcome::NoPagesProduced => {
            eprintln!("error: no pages were produced from the given files");
            Ok(ExitCode::from(2))
        }
    }
}

/// Write one output document, or remove a file left at `path` by an earlier
/// run when this run produced nothing for it. Returns whether a file was written.
fn write_output(path: &Path, bytes: Option<&[u8]>) -> anyhow::Result<bool> {
    match bytes {
        Some(bytes) => {
            std::fs::write(path, bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            Ok(true)
        }
        None => {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::info!("Removed stale output {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to remove stale {}", path.display()));
                }
            }
            Ok(false)
        }
    }
}
