//! Split a batch of PDFs into a color document and a black & white document
//!
//! Every page is rendered to a small thumbnail, classified, and its original
//! (unrendered) content copied into one of two outputs using lopdf.
//!
//! - `classify`: luminance-adaptive color detection on pixel buffers
//! - `source` / `assemble`: page copying and output construction
//! - `pipeline`: per-file, per-page orchestration and the run report
//!
//! Rendering is pluggable through [`PageRasterizer`]; enable the `pdfium`
//! feature for the bundled pdfium backend.

pub mod assemble;
pub mod classify;
pub mod error;
pub mod pipeline;
pub mod raster;
pub mod source;

pub use assemble::{DocumentAssembler, OutputAccumulator};
pub use classify::{analyze, classify, ColorAnalysis, PageClass, Threshold};
pub use error::{ErrorKind, SplitError};
pub use pipeline::{
    run_split, Diagnostic, PageRecord, ProgressEvent, RunOutcome, RunReport, SplitOptions,
    SplitOutput, SplitPipeline,
};
pub use raster::{PageRasterizer, PixelBuffer, RasterSource, RENDER_SCALE};
pub use source::{CopiedPage, InputFile, MemoryFile, SourceDocument};

#[cfg(feature = "pdfium")]
pub use raster::PdfiumRasterizer;
