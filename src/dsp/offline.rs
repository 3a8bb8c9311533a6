//! Offline filter engine: decodes a source and renders the whole buffer
//! through one biquad stage per channel.

use std::fmt;
use std::str::FromStr;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::decode;
use super::filter::{BiquadFilter, DEFAULT_RESONANCE_DB, Topology};
use super::pcm::PcmBuffer;
use crate::error::{RenderError, VoxError};
use crate::source::AudioSource;

/// The local filter presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterKind {
    LowpassNoise,
    HighpassEcho,
    BandpassMusic,
    NotchSiren,
}

impl FilterKind {
    pub const ALL: [FilterKind; 4] = [
        FilterKind::LowpassNoise,
        FilterKind::HighpassEcho,
        FilterKind::BandpassMusic,
        FilterKind::NotchSiren,
    ];

    pub fn id(self) -> &'static str {
        match self {
            FilterKind::LowpassNoise => "lowpass-noise",
            FilterKind::HighpassEcho => "highpass-echo",
            FilterKind::BandpassMusic => "bandpass-music",
            FilterKind::NotchSiren => "notch-siren",
        }
    }

    pub fn topology(self) -> Topology {
        match self {
            FilterKind::LowpassNoise => Topology::Lowpass,
            FilterKind::HighpassEcho => Topology::Highpass,
            FilterKind::BandpassMusic => Topology::Bandpass,
            FilterKind::NotchSiren => Topology::Notch,
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for FilterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterKind::ALL
            .into_iter()
            .find(|k| k.id() == s)
            .ok_or_else(|| format!("unknown filter '{s}'"))
    }
}

/// One filter pass: a preset and its 0–100 intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterConfig {
    pub kind: FilterKind,
    intensity: u8,
}

/// Parameters derived from a [`FilterConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParams {
    pub topology: Topology,
    pub frequency_hz: f64,
    /// Linear Q for band-pass/notch. `None` means the node default
    /// resonance is used.
    pub q: Option<f64>,
}

impl FilterConfig {
    /// Build a config; intensity is clamped into 0..=100.
    pub fn new(kind: FilterKind, intensity: i32) -> Self {
        FilterConfig {
            kind,
            intensity: intensity.clamp(0, 100) as u8,
        }
    }

    pub fn intensity(&self) -> u8 {
        self.intensity
    }

    /// Derive cutoff/center frequency and resonance from intensity.
    pub fn params(&self) -> FilterParams {
        let i = self.intensity as u32;
        let topology = self.kind.topology();
        match self.kind {
            FilterKind::LowpassNoise => FilterParams {
                topology,
                frequency_hz: (3000 + (100 - i) * 50) as f64,
                q: None,
            },
            FilterKind::HighpassEcho => FilterParams {
                topology,
                frequency_hz: (200 + i * 5) as f64,
                q: None,
            },
            FilterKind::BandpassMusic => FilterParams {
                topology,
                frequency_hz: 1000.0,
                q: Some(i as f64 / 10.0),
            },
            FilterKind::NotchSiren => FilterParams {
                topology,
                frequency_hz: 800.0,
                q: Some(i as f64 / 5.0),
            },
        }
    }
}

impl FilterParams {
    /// Fresh filter state for one channel.
    pub fn build(&self, sample_rate: u32) -> BiquadFilter {
        BiquadFilter::new(
            self.topology,
            self.frequency_hz,
            self.q.unwrap_or(DEFAULT_RESONANCE_DB),
            sample_rate as f64,
        )
    }
}

/// Renders whole buffers through a filter preset, faster or slower than
/// real time, always to completion before returning.
#[derive(Debug, Clone, Default)]
pub struct OfflineFilterEngine;

impl OfflineFilterEngine {
    pub fn new() -> Self {
        OfflineFilterEngine
    }

    /// Decode `source` and render it through `config`.
    pub fn render(&self, source: &AudioSource, config: &FilterConfig) -> Result<PcmBuffer, VoxError> {
        let decoded = decode::decode(source.bytes(), source.mime())?;
        Ok(self.render_buffer(&decoded, config)?)
    }

    /// Render an already decoded buffer. Channel count, sample rate and
    /// frame count are preserved.
    pub fn render_buffer(&self, input: &PcmBuffer, config: &FilterConfig) -> Result<PcmBuffer, RenderError> {
        let params = config.params();
        debug!(
            "{}: {:?} at {} Hz, q {:?}, {} ch @ {} Hz",
            config.kind,
            params.topology,
            params.frequency_hz,
            params.q,
            input.channel_count(),
            input.sample_rate()
        );

        let mut channels = Vec::with_capacity(input.channel_count());
        for (ch, data) in input.channels().iter().enumerate() {
            let mut filter = params.build(input.sample_rate());
            let mut out = data.clone();
            filter.process_block(&mut out);
            if let Some(frame) = out.iter().position(|s| !s.is_finite()) {
                return Err(RenderError::NonFinite { channel: ch, frame });
            }
            channels.push(out);
        }

        let rendered = PcmBuffer::new(input.sample_rate(), channels)?;
        info!(
            "rendered {:.2}s through {} (intensity {})",
            rendered.duration_seconds(),
            config.kind,
            config.intensity()
        );
        Ok(rendered)
    }
}
