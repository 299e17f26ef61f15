//! Split pipeline
//!
//! Files are handled one at a time in input order, pages one at a time in
//! page order, so each output mirrors the input order exactly. Every error
//! below the run level is recoverable:
//!
//! | failure                     | effect                                    |
//! |-----------------------------|-------------------------------------------|
//! | read / parse / raster open  | file skipped, file diagnostic             |
//! | page rasterization          | page routed as black & white, no error    |
//! | page copy                   | page skipped, page diagnostic             |
//! | output serialization        | that output absent, output diagnostic     |

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::assemble::DocumentAssembler;
use crate::classify::{analyze, PageClass, Threshold};
use crate::error::{ErrorKind, SplitError};
use crate::raster::{PageRasterizer, RasterSource, RENDER_SCALE};
use crate::source::{InputFile, SourceDocument};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitOptions {
    pub threshold: Threshold,
    /// Put a blank page between the pages of consecutive input files
    pub insert_separators: bool,
}

/// Live progress for presentation layers
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    FileStarted {
        file_index: usize,
        file_count: usize,
        name: String,
    },
    PageProcessed {
        file_index: usize,
        page_index: usize,
        page_count: usize,
    },
    Finalizing,
}

/// A page that made it into one of the outputs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageRecord {
    pub file_index: usize,
    pub file_name: String,
    pub page_index: usize,
    pub class: PageClass,
    /// Rasterization failed and the page was routed as black & white by default
    pub render_fallback: bool,
}

/// A recoverable failure recorded during a run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Diagnostic {
    File {
        file_index: usize,
        file_name: String,
        kind: ErrorKind,
        message: String,
    },
    Page {
        file_index: usize,
        file_name: String,
        page_index: usize,
        kind: ErrorKind,
        message: String,
    },
    Output {
        class: PageClass,
        kind: ErrorKind,
        message: String,
    },
}

impl Diagnostic {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Diagnostic::File { kind, .. }
            | Diagnostic::Page { kind, .. }
            | Diagnostic::Output { kind, .. } => *kind,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::File {
                file_name, message, ..
            } => write!(f, "{}: {}", file_name, message),
            Diagnostic::Page {
                file_name,
                page_index,
                message,
                ..
            } => write!(f, "{} page {}: {}", file_name, page_index + 1, message),
            Diagnostic::Output { class, message, .. } => {
                write!(f, "{} output: {}", class, message)
            }
        }
    }
}

/// Counters and diagnostics for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub color_pages: usize,
    pub bw_pages: usize,
    /// Routed pages in routing order
    pub pages: Vec<PageRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunReport {
    pub fn total_pages(&self) -> usize {
        self.color_pages + self.bw_pages
    }

    pub fn render_fallbacks(&self) -> usize {
        self.pages.iter().filter(|p| p.render_fallback).count()
    }

    fn record_page(&mut self, record: PageRecord) {
        match record.class {
            PageClass::Color => self.color_pages += 1,
            PageClass::BlackAndWhite => self.bw_pages += 1,
        }
        self.pages.push(record);
    }

    fn record(&mut self, diagnostic: Diagnostic) {
        warn!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }

    fn file_failed(&mut self, file_index: usize, file_name: &str, error: SplitError) {
        self.record(Diagnostic::File {
            file_index,
            file_name: file_name.to_string(),
            kind: error.kind(),
            message: error.to_string(),
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    /// The run finished but not a single page reached either output
    NoPagesProduced,
}

/// Everything a finished run hands back
#[derive(Debug)]
pub struct SplitOutput {
    pub outcome: RunOutcome,
    pub report: RunReport,
    pub color: Option<Vec<u8>>,
    pub black_and_white: Option<Vec<u8>>,
}

type ProgressCallback<'r> = Box<dyn FnMut(&ProgressEvent) + 'r>;

/// One split run; consumed by [`SplitPipeline::run`]
pub struct SplitPipeline<'r> {
    rasterizer: &'r dyn PageRasterizer,
    options: SplitOptions,
    progress: Option<ProgressCallback<'r>>,
}

impl<'r> SplitPipeline<'r> {
    pub fn new(rasterizer: &'r dyn PageRasterizer, options: SplitOptions) -> Self {
        Self {
            rasterizer,
            options,
            progress: None,
        }
    }

    pub fn on_progress(mut self, callback: impl FnMut(&ProgressEvent) + 'r) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    fn emit(&mut self, event: ProgressEvent) {
        if let Some(callback) = self.progress.as_mut() {
            callback(&event);
        }
    }

    pub fn run<F: InputFile>(mut self, files: &[F]) -> SplitOutput {
        info!(
            "Splitting {} file(s), threshold {}, separators {}",
            files.len(),
            self.options.threshold.value(),
            if self.options.insert_separators { "on" } else { "off" }
        );

        let rasterizer = self.rasterizer;
        let mut assembler = DocumentAssembler::new();
        let mut report = RunReport::default();
        let mut opened_files = 0usize;

        for (file_index, file) in files.iter().enumerate() {
            let name = file.name();
            self.emit(ProgressEvent::FileStarted {
                file_index,
                file_count: files.len(),
                name: name.clone(),
            });

            let bytes = match file.read_bytes() {
                Ok(bytes) => bytes,
                Err(e) => {
                    report.file_failed(file_index, &name, SplitError::Io(e));
                    continue;
                }
            };

            let source = match SourceDocument::load(name.clone(), &bytes) {
                Ok(source) => source,
                Err(e) => {
                    report.file_failed(file_index, &name, e);
                    continue;
                }
            };

            let raster = match rasterizer.open(&bytes) {
                Ok(raster) => raster,
                Err(e) => {
                    report.file_failed(file_index, &name, e);
                    continue;
                }
            };

            if self.options.insert_separators && opened_files > 0 {
                assembler.insert_separator(source.media_box(0));
            }
            opened_files += 1;

            info!("{}: {} page(s)", name, source.page_count());
            self.split_pages(
                file_index,
                &source,
                raster.as_ref(),
                &mut assembler,
                &mut report,
            );
        }

        self.emit(ProgressEvent::Finalizing);

        let (color, black_and_white) = collect_outputs(assembler.finalize(), &mut report);

        let outcome = if report.total_pages() == 0 {
            RunOutcome::NoPagesProduced
        } else {
            RunOutcome::Completed
        };

        info!(
            "Split finished: {} color, {} black & white, {} diagnostic(s)",
            report.color_pages,
            report.bw_pages,
            report.diagnostics.len()
        );

        SplitOutput {
            outcome,
            report,
            color,
            black_and_white,
        }
    }

    fn split_pages(
        &mut self,
        file_index: usize,
        source: &SourceDocument,
        raster: &dyn RasterSource,
        assembler: &mut DocumentAssembler,
        report: &mut RunReport,
    ) {
        let page_count = source.page_count();

        for page_index in 0..page_count {
            let (class, render_fallback) = match raster.rasterize_page(page_index, RENDER_SCALE) {
                Ok(buffer) => {
                    let analysis = analyze(&buffer, self.options.threshold);
                    debug!(
                        "{} page {}: {} ({}/{} colored, cutoff {})",
                        source.name(),
                        page_index + 1,
                        analysis.classification,
                        analysis.colored,
                        analysis.sampled,
                        analysis.cutoff
                    );
                    (analysis.classification, false)
                }
                Err(e) => {
                    warn!(
                        "{} page {}: {}; routing as black & white",
                        source.name(),
                        page_index + 1,
                        e
                    );
                    (PageClass::BlackAndWhite, true)
                }
            };

            match assembler.append_page(class, source, page_index) {
                Ok(()) => report.record_page(PageRecord {
                    file_index,
                    file_name: source.name().to_string(),
                    page_index,
                    class,
                    render_fallback,
                }),
                Err(e) => report.record(Diagnostic::Page {
                    file_index,
                    file_name: source.name().to_string(),
                    page_index,
                    kind: e.kind(),
                    message: e.to_string(),
                }),
            }

            self.emit(ProgressEvent::PageProcessed {
                file_index,
                page_index,
                page_count,
            });
        }
    }
}

/// Sort finalized outputs by class; a failed one is left out and reported
///
/// Page counters are not touched: the pages were routed, only the write failed.
fn collect_outputs(
    results: Vec<(PageClass, Result<Vec<u8>, SplitError>)>,
    report: &mut RunReport,
) -> (Option<Vec<u8>>, Option<Vec<u8>>) {
    let mut color = None;
    let mut black_and_white = None;
    for (class, result) in results {
        match result {
            Ok(bytes) => match class {
                PageClass::Color => color = Some(bytes),
                PageClass::BlackAndWhite => black_and_white = Some(bytes),
            },
            Err(e) => report.record(Diagnostic::Output {
                class,
                kind: e.kind(),
                message: e.to_string(),
            }),
        }
    }
    (color, black_and_white)
}

/// Run a split with no progress reporting
pub fn run_split<F: InputFile>(
    files: &[F],
    threshold: Threshold,
    insert_separators: bool,
    rasterizer: &dyn PageRasterizer,
) -> SplitOutput {
    let options = SplitOptions {
        threshold,
        insert_separators,
    };
    SplitPipeline::new(rasterizer, options).run(files)
}
