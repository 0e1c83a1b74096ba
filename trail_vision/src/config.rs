// THEORY:
// `TrailConfig` is the on-disk description of a run, read from TOML. Every field is
// optional and falls back to the defaults of the coordinate-logging setup, so an
// empty file is a valid configuration.
//
// Numbers in `[parameters]` are written in the same units as the control surface and
// go through the same clamping and kernel-size normalization, so a value accepted
// from a file behaves exactly like the same value typed at runtime.

use crate::core_modules::background::BackgroundConfig;
use crate::core_modules::filters::Polarity;
use crate::core_modules::params::{
    Parameters, aspect_cutoff_from_slider, kernel_from_slider, max_area_from_slider, min_area_from_slider,
    threshold_from_slider,
};
use crate::core_modules::preprocessor::{DEFAULT_CLOSING_KERNEL_SIZE, SegmentationMode};
use crate::error::{Result, TrailError};
use crate::pipeline::PipelineConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrailConfig {
    pub parameters: ParameterSection,
    pub pipeline: PipelineSection,
    pub background: BackgroundConfig,
    pub logging: LoggingSection,
}

/// Initial slider positions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParameterSection {
    pub threshold_level: i64,
    pub blur_kernel_size: i64,
    pub foreground_mask_blur_kernel_size: i64,
    pub min_blob_area: i64,
    pub max_blob_area: i64,
    /// Hundredths; absent disables the aspect-ratio filter.
    pub aspect_ratio_cutoff: Option<i64>,
}

impl Default for ParameterSection {
    fn default() -> Self {
        Self {
            threshold_level: 132,
            blur_kernel_size: 7,
            foreground_mask_blur_kernel_size: 13,
            min_blob_area: 50,
            max_blob_area: 10_000,
            aspect_ratio_cutoff: None,
        }
    }
}

impl ParameterSection {
    pub fn to_parameters(&self) -> Parameters {
        Parameters {
            threshold_level: threshold_from_slider(self.threshold_level),
            blur_kernel_size: kernel_from_slider(self.blur_kernel_size),
            foreground_mask_blur_kernel_size: kernel_from_slider(self.foreground_mask_blur_kernel_size),
            min_blob_area: min_area_from_slider(self.min_blob_area),
            max_blob_area: max_area_from_slider(self.max_blob_area),
            aspect_ratio_cutoff: self.aspect_ratio_cutoff.map(aspect_cutoff_from_slider),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub mode: SegmentationMode,
    pub polarity: Polarity,
    pub closing_kernel_size: u32,
    pub trail_enabled: bool,
    pub logging_enabled: bool,
    pub trail_capacity: Option<usize>,
    pub inactivity_window_ms: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            mode: SegmentationMode::StaticThreshold,
            polarity: Polarity::Inverted,
            closing_kernel_size: DEFAULT_CLOSING_KERNEL_SIZE,
            trail_enabled: true,
            logging_enabled: true,
            trail_capacity: None,
            inactivity_window_ms: 4_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub path: PathBuf,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("centroids.csv"),
        }
    }
}

impl TrailConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TrailError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Splits the file into the initial parameter snapshot and the fixed pipeline
    /// configuration.
    pub fn into_parts(self) -> (Parameters, PipelineConfig) {
        let parameters = self.parameters.to_parameters();
        let pipeline = PipelineConfig {
            mode: self.pipeline.mode,
            polarity: self.pipeline.polarity,
            closing_kernel_size: self.pipeline.closing_kernel_size,
            trail_enabled: self.pipeline.trail_enabled,
            logging_enabled: self.pipeline.logging_enabled,
            trail_capacity: self.pipeline.trail_capacity,
            inactivity_window: Duration::from_millis(self.pipeline.inactivity_window_ms),
            background: self.background,
            log_path: self.logging.path,
        };
        (parameters, pipeline)
    }
}
