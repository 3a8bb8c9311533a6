//! Runtime configuration for the pipeline.
//!
//! Loaded from camelCase JSON; every field has a default so hosts only
//! need to override what they care about.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::visual::VisualStyle;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    /// Base URL of the remote effect service. Relative result paths are
    /// resolved against it.
    pub service_url: String,
    /// Delay in seconds sent with every remote request. Only echo-like
    /// effects read it.
    pub echo_delay_seconds: f64,
    /// Repeat count sent with every remote request. Only stutter-like
    /// effects read it.
    pub stutter_repeat: u32,
    /// Ask the remote service to denoise before applying the effect.
    pub noise_pre_filter: bool,
    /// Intensity used for local filters when the caller gives none.
    pub default_intensity: u8,
    pub analyzer: AnalyzerConfig,
}

/// Frequency analysis settings shared by every analyzer tap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzerConfig {
    /// Transform window in samples. Bin count is half of this.
    pub fft_size: usize,
    pub smoothing_time_constant: f64,
    pub min_decibels: f64,
    pub max_decibels: f64,
    pub style: VisualStyle,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            service_url: "http://localhost:8000".to_string(),
            echo_delay_seconds: 0.2,
            stutter_repeat: 3,
            noise_pre_filter: false,
            default_intensity: 50,
            analyzer: AnalyzerConfig::default(),
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            fft_size: 256,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            style: VisualStyle::Bars,
        }
    }
}

impl AnalyzerConfig {
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

impl CoreConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: CoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_url.trim().is_empty() {
            return Err(invalid("serviceUrl", "must not be empty"));
        }
        if !(self.echo_delay_seconds.is_finite() && self.echo_delay_seconds >= 0.0) {
            return Err(invalid("echoDelaySeconds", "must be a non-negative number"));
        }
        if self.default_intensity > 100 {
            return Err(invalid("defaultIntensity", "must be within 0..=100"));
        }

        let a = &self.analyzer;
        if !a.fft_size.is_power_of_two() || !(32..=32768).contains(&a.fft_size) {
            return Err(invalid(
                "analyzer.fftSize",
                &format!("{} is not a power of two in 32..=32768", a.fft_size),
            ));
        }
        if !(0.0..=1.0).contains(&a.smoothing_time_constant) {
            return Err(invalid("analyzer.smoothingTimeConstant", "must be within 0..=1"));
        }
        if a.min_decibels >= a.max_decibels {
            return Err(invalid(
                "analyzer.minDecibels",
                "must be lower than maxDecibels",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
