//! Software frequency analyzer producing AnalyserNode-compatible byte bins.
//!
//! Used by native adapters (and tests) that have no host analyser node:
//! samples are pushed in as they play or record, and each display frame
//! reads the latest window.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

use crate::analyzer::FrequencyAnalyzer;
use crate::config::AnalyzerConfig;

pub struct FftAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    /// Ring of the most recent `fft_size` samples.
    history: Vec<f32>,
    write_pos: usize,
    smoothed: Vec<f64>,
    scratch: Vec<Complex<f32>>,
    smoothing: f64,
    min_db: f64,
    max_db: f64,
    connected: bool,
}

impl FftAnalyzer {
    pub fn new(config: &AnalyzerConfig) -> Self {
        let size = config.fft_size;
        let fft = FftPlanner::<f32>::new().plan_fft_forward(size);
        FftAnalyzer {
            fft,
            window: (0..size).map(|i| blackman_window(i, size)).collect(),
            history: vec![0.0; size],
            write_pos: 0,
            smoothed: vec![0.0; size / 2],
            scratch: vec![Complex::new(0.0, 0.0); size],
            smoothing: config.smoothing_time_constant,
            min_db: config.min_decibels,
            max_db: config.max_decibels,
            connected: true,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.history.len()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Feed mono samples. Once disconnected, input is ignored.
    pub fn push_samples(&mut self, samples: &[f32]) {
        if !self.connected {
            return;
        }
        let len = self.history.len();
        for &s in samples {
            self.history[self.write_pos] = s;
            self.write_pos = (self.write_pos + 1) % len;
        }
    }

    /// Run the transform and update smoothed magnitudes.
    fn analyse(&mut self) {
        let len = self.history.len();
        for i in 0..len {
            let sample = self.history[(self.write_pos + i) % len];
            self.scratch[i] = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.scratch);

        let norm = 1.0 / len as f64;
        let tau = self.smoothing;
        for (k, value) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.scratch[k].norm() as f64 * norm;
            let next = tau * *value + (1.0 - tau) * magnitude;
            *value = if next.is_finite() { next } else { 0.0 };
        }
    }

    /// Current smoothed magnitudes in dB.
    pub fn float_frequency_data(&mut self, out: &mut [f32]) {
        self.analyse();
        for (o, &m) in out.iter_mut().zip(&self.smoothed) {
            *o = (20.0 * m.log10()) as f32;
        }
    }
}

impl FrequencyAnalyzer for FftAnalyzer {
    fn bin_count(&self) -> usize {
        self.smoothed.len()
    }

    fn byte_frequency_data(&mut self, bins: &mut [u8]) {
        self.analyse();
        let range = self.max_db - self.min_db;
        for (b, &m) in bins.iter_mut().zip(&self.smoothed) {
            let db = 20.0 * m.log10();
            let scaled = 255.0 / range * (db - self.min_db);
            *b = if scaled.is_nan() {
                0
            } else {
                scaled.clamp(0.0, 255.0).floor() as u8
            };
        }
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

/// Blackman window (alpha 0.16), as used by AnalyserNode.
pub fn blackman_window(index: usize, size: usize) -> f32 {
    let x = index as f32 / size as f32;
    0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
}
