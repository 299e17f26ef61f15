//! Page rasterization
//!
//! The pipeline never renders pages itself. It asks a [`PageRasterizer`] to
//! open the input bytes once per file and then renders pages through the
//! returned [`RasterSource`]. The only bundled backend is pdfium, behind the
//! `pdfium` feature.

use crate::error::SplitError;

/// Scale used for classification thumbnails (0.5 = 36 DPI)
pub const RENDER_SCALE: f32 = 0.5;

/// An RGBA8 pixel grid, row-major, four bytes per pixel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA bytes, checking that the length matches the dimensions
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, SplitError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| {
                SplitError::InvalidBuffer(format!("{}x{} overflows", width, height))
            })?;

        if data.len() != expected {
            return Err(SplitError::InvalidBuffer(format!(
                "expected {} bytes for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }

        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Buffer filled with a single RGBA value
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Iterate pixels as `[r, g, b, a]`
    pub fn pixels(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.data.chunks_exact(4)
    }
}

/// Renders pages of one opened document
pub trait RasterSource {
    fn page_count(&self) -> usize;

    /// Render page `index` (0-based) at `scale` times its size in points
    fn rasterize_page(&self, index: usize, scale: f32) -> Result<PixelBuffer, SplitError>;
}

/// Opens PDF bytes for rendering
pub trait PageRasterizer {
    fn open<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn RasterSource + 'a>, SplitError>;
}

#[cfg(feature = "pdfium")]
pub use self::pdfium::PdfiumRasterizer;

#[cfg(feature = "pdfium")]
mod pdfium {
    use super::{PageRasterizer, PixelBuffer, RasterSource};
    use crate::error::SplitError;
    use pdfium_render::prelude::*;

    /// Rasterizer backed by the pdfium shared library
    pub struct PdfiumRasterizer {
        pdfium: Pdfium,
    }

    impl PdfiumRasterizer {
        /// Bind pdfium from the working directory, falling back to the system library
        pub fn new() -> Result<Self, SplitError> {
            let bindings =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                    .or_else(|_| Pdfium::bind_to_system_library())
                    .map_err(|e| {
                        SplitError::Render(format!("Failed to bind pdfium library: {}", e))
                    })?;
            Ok(Self {
                pdfium: Pdfium::new(bindings),
            })
        }
    }

    struct PdfiumSource<'a> {
        document: PdfDocument<'a>,
    }

    impl PageRasterizer for PdfiumRasterizer {
        fn open<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn RasterSource + 'a>, SplitError> {
            let document = self
                .pdfium
                .load_pdf_from_byte_slice(bytes, None)
                .map_err(|e| SplitError::Decode(e.to_string()))?;
            Ok(Box::new(PdfiumSource { document }))
        }
    }

    impl RasterSource for PdfiumSource<'_> {
        fn page_count(&self) -> usize {
            self.document.pages().len() as usize
        }

        fn rasterize_page(&self, index: usize, scale: f32) -> Result<PixelBuffer, SplitError> {
            let page_index = u16::try_from(index)
                .map_err(|_| SplitError::Render(format!("Page index {} out of range", index)))?;
            let page = self
                .document
                .pages()
                .get(page_index)
                .map_err(|e| SplitError::Render(e.to_string()))?;

            let bitmap = page
                .render_with_config(
                    &PdfRenderConfig::new()
                        .scale_page_by_factor(scale)
                        .render_form_data(true)
                        .render_annotations(true),
                )
                .map_err(|e| SplitError::Render(e.to_string()))?;

            let width = u32::try_from(bitmap.width()).unwrap_or(0);
            let height = u32::try_from(bitmap.height()).unwrap_or(0);
            PixelBuffer::from_rgba(width, height, bitmap.as_rgba_bytes())
                .map_err(|e| SplitError::Render(e.to_string()))
        }
    }
}
