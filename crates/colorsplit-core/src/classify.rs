//! Color detection on rendered page thumbnails
//!
//! A page counts as color when enough of its sampled pixels carry a real
//! color signal. Saturation alone misreads scans with shadows or glare, so
//! each pixel is judged by a rule that depends on its luminance regime:
//!
//! ```text
//! dark   (luma < 60)    saturation% > 0.7 * threshold  or  chroma > 18
//! mid                   saturation% >       threshold  or (chroma > 24 and saturation > 0.12)
//! bright (luma > 200)   saturation% > 0.8 * threshold  or  chroma > 28
//! ```
//!
//! The fraction of colored pixels needed to call the page color drops when
//! most of the page sits in the dark or bright regimes.

use serde::Serialize;

use crate::error::SplitError;
use crate::raster::PixelBuffer;

/// Only every Nth pixel is inspected
pub const SAMPLE_STRIDE: usize = 4;

/// Pixels with alpha below this are ignored
pub const MIN_ALPHA: u8 = 16;

const DARK_LUMA: f32 = 60.0;
const BRIGHT_LUMA: f32 = 200.0;

const DARK_SATURATION_FACTOR: f32 = 0.7;
const BRIGHT_SATURATION_FACTOR: f32 = 0.8;

const DARK_CHROMA_FLOOR: u8 = 18;
const MID_CHROMA_FLOOR: u8 = 24;
const BRIGHT_CHROMA_FLOOR: u8 = 28;
const MID_MIN_SATURATION: f32 = 0.12;

/// Colored fraction a page must exceed to be color
const COLOR_FRACTION: f32 = 0.01;
/// Same, once the page is dominated by extreme luminance
const EXTREME_COLOR_FRACTION: f32 = 0.004;
/// Share of dark + bright pixels that switches to the lowered cutoff
const EXTREME_REGIME_SHARE: f32 = 0.6;

/// Classification sensitivity, 10 (lenient) to 100 (strict)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Threshold(u8);

impl Threshold {
    pub const MIN: u8 = 10;
    pub const MAX: u8 = 100;

    pub fn new(value: u32) -> Result<Self, SplitError> {
        if (Self::MIN as u32..=Self::MAX as u32).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(SplitError::InvalidThreshold(value))
        }
    }

    /// Saturate into the supported range
    pub fn clamped(value: u32) -> Self {
        Self(value.clamp(Self::MIN as u32, Self::MAX as u32) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(50)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageClass {
    Color,
    BlackAndWhite,
}

impl std::fmt::Display for PageClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageClass::Color => f.write_str("color"),
            PageClass::BlackAndWhite => f.write_str("black & white"),
        }
    }
}

/// Sample statistics behind one classification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorAnalysis {
    pub sampled: usize,
    pub colored: usize,
    pub dark: usize,
    pub bright: usize,
    /// Colored fraction the page had to exceed
    pub cutoff: f32,
    pub classification: PageClass,
}

impl ColorAnalysis {
    pub fn colored_fraction(&self) -> f32 {
        fraction(self.colored, self.sampled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Regime {
    Dark,
    Mid,
    Bright,
}

struct PixelSignal {
    regime: Regime,
    colored: bool,
}

fn inspect_pixel(r: u8, g: u8, b: u8, threshold: f32) -> PixelSignal {
    let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let chroma = max - min;
    let saturation = if max == 0 {
        0.0
    } else {
        chroma as f32 / max as f32
    };
    let saturation_pct = saturation * 100.0;

    if luma < DARK_LUMA {
        PixelSignal {
            regime: Regime::Dark,
            colored: saturation_pct > DARK_SATURATION_FACTOR * threshold
                || chroma > DARK_CHROMA_FLOOR,
        }
    } else if luma > BRIGHT_LUMA {
        PixelSignal {
            regime: Regime::Bright,
            colored: saturation_pct > BRIGHT_SATURATION_FACTOR * threshold
                || chroma > BRIGHT_CHROMA_FLOOR,
        }
    } else {
        PixelSignal {
            regime: Regime::Mid,
            colored: saturation_pct > threshold
                || (chroma > MID_CHROMA_FLOOR && saturation > MID_MIN_SATURATION),
        }
    }
}

fn fraction(part: usize, whole: usize) -> f32 {
    if whole == 0 {
        0.0
    } else {
        part as f32 / whole as f32
    }
}

/// Gather sample statistics and decide the page class
pub fn analyze(buffer: &PixelBuffer, threshold: Threshold) -> ColorAnalysis {
    let threshold = threshold.value() as f32;
    let (mut sampled, mut colored, mut dark, mut bright) = (0usize, 0usize, 0usize, 0usize);

    for px in buffer.pixels().step_by(SAMPLE_STRIDE) {
        if px[3] < MIN_ALPHA {
            continue;
        }
        sampled += 1;

        let signal = inspect_pixel(px[0], px[1], px[2], threshold);
        match signal.regime {
            Regime::Dark => dark += 1,
            Regime::Bright => bright += 1,
            Regime::Mid => {}
        }
        if signal.colored {
            colored += 1;
        }
    }

    let cutoff = if fraction(dark + bright, sampled) > EXTREME_REGIME_SHARE {
        EXTREME_COLOR_FRACTION
    } else {
        COLOR_FRACTION
    };

    // An empty sample (fully transparent page) falls through to black & white.
    let classification = if sampled > 0 && fraction(colored, sampled) > cutoff {
        PageClass::Color
    } else {
        PageClass::BlackAndWhite
    };

    ColorAnalysis {
        sampled,
        colored,
        dark,
        bright,
        cutoff,
        classification,
    }
}

pub fn classify(buffer: &PixelBuffer, threshold: Threshold) -> PageClass {
    analyze(buffer, threshold).classification
}
