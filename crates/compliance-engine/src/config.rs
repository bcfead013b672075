//! Scan configuration
//!
//! Every field has a default, so an empty TOML file (or none at all) gives
//! the standard behaviour.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub color_band: ColorBand,

    /// Concurrent classifier calls
    #[serde(default = "default_pool_size")]
    pub classifier_pool_size: usize,

    /// Pages per document-wide classifier chunk
    #[serde(default = "default_chunk_pages")]
    pub document_chunk_pages: usize,

    /// Characters of the normalized quote used as the finding dedup key
    #[serde(default = "default_dedup_key_len")]
    pub dedup_key_len: usize,

    #[serde(default = "default_opacity")]
    pub highlight_opacity: f64,

    #[serde(default)]
    pub reference_markers: MarkerPolicyKind,
}

/// Red-dominant colour band used to flag leftover edit marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorBand {
    #[serde(default = "default_min_red")]
    pub min_red: u8,
    #[serde(default = "default_max_green")]
    pub max_green: u8,
    #[serde(default = "default_max_blue")]
    pub max_blue: u8,
}

impl ColorBand {
    pub fn contains(&self, (r, g, b): (u8, u8, u8)) -> bool {
        r >= self.min_red && g <= self.max_green && b <= self.max_blue && (r > g || r > b)
    }
}

impl Default for ColorBand {
    fn default() -> Self {
        Self {
            min_red: default_min_red(),
            max_green: default_max_green(),
            max_blue: default_max_blue(),
        }
    }
}

/// How a body span is recognised as a footnote reference marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerPolicyKind {
    /// The whole span is digits or asterisks
    #[default]
    Bare,
    /// Bare, and set smaller than the body text
    Superscript,
}

fn default_min_red() -> u8 {
    100
}

fn default_max_green() -> u8 {
    120
}

fn default_max_blue() -> u8 {
    120
}

fn default_pool_size() -> usize {
    4
}

fn default_chunk_pages() -> usize {
    5
}

fn default_dedup_key_len() -> usize {
    120
}

fn default_opacity() -> f64 {
    0.4
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            color_band: ColorBand::default(),
            classifier_pool_size: default_pool_size(),
            document_chunk_pages: default_chunk_pages(),
            dedup_key_len: default_dedup_key_len(),
            highlight_opacity: default_opacity(),
            reference_markers: MarkerPolicyKind::default(),
        }
    }
}

impl ScanConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).context("Failed to parse TOML configuration")?;
        Ok(config.sanitized())
    }

    /// Clamp values that would stall or break a run.
    pub fn sanitized(mut self) -> Self {
        self.classifier_pool_size = self.classifier_pool_size.max(1);
        self.document_chunk_pages = self.document_chunk_pages.max(1);
        self.dedup_key_len = self.dedup_key_len.max(1);
        self.highlight_opacity = self.highlight_opacity.clamp(0.0, 1.0);
        self
    }
}
