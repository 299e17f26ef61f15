//! Configuration file support
//!
//! Settings come from an optional TOML file; command-line flags win over it.
//!
//! ```toml
//! [split]
//! threshold = 40
//! insert_separators = true
//!
//! [output]
//! directory = "out"
//! color_file = "color.pdf"
//! bw_file = "bw.pdf"
//! report_file = "out/report.json"
//! ```

use anyhow::Context;
use colorsplit_core::{SplitOptions, Threshold};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Sensitivity, 10 (lenient) to 100 (strict)
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    #[serde(default)]
    pub insert_separators: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_color_file")]
    pub color_file: String,
    #[serde(default = "default_bw_file")]
    pub bw_file: String,
    /// Where to write the JSON run report, if anywhere
    #[serde(default)]
    pub report_file: Option<PathBuf>,
}

fn default_threshold() -> u32 {
    Threshold::default().value() as u32
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_color_file() -> String {
    "color.pdf".to_string()
}

fn default_bw_file() -> String {
    "bw.pdf".to_string()
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            insert_separators: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            color_file: default_color_file(),
            bw_file: default_bw_file(),
            report_file: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse TOML configuration")
    }

    /// Validated options for the split pipeline
    pub fn split_options(&self) -> anyhow::Result<SplitOptions> {
        let threshold = Threshold::new(self.split.threshold).context("Invalid threshold")?;
        if self.color_path() == self.bw_path() {
            anyhow::bail!(
                "Color and black & white outputs both point to {}",
                self.color_path().display()
            );
        }
        Ok(SplitOptions {
            threshold,
            insert_separators: self.split.insert_separators,
        })
    }

    pub fn color_path(&self) -> PathBuf {
        self.output.directory.join(&self.output.color_file)
    }

    pub fn bw_path(&self) -> PathBuf {
        self.output.directory.join(&self.output.bw_file)
    }
}
