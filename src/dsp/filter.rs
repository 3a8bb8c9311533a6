//! Biquad filter: matches WebAudio BiquadFilterNode coefficients,
//! including its handling of degenerate frequency and Q values.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Default resonance of low/high-pass nodes, in dB.
pub const DEFAULT_RESONANCE_DB: f64 = 1.0;

/// Second-order filter shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    Lowpass,
    Highpass,
    Bandpass,
    Notch,
}

/// Normalized coefficients (a0 = 1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Coefficients {
    const PASSTHROUGH: Coefficients = Coefficients {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    const SILENT: Coefficients = Coefficients {
        b0: 0.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Compute coefficients the way BiquadFilterNode does.
    ///
    /// `q` is a dB resonance for low/high-pass and a linear quality factor
    /// for band-pass and notch.
    pub fn compute(topology: Topology, frequency: f64, q: f64, sample_rate: f64) -> Self {
        let nyquist = sample_rate / 2.0;
        let f = (frequency / nyquist).clamp(0.0, 1.0);

        match topology {
            Topology::Lowpass => {
                if f >= 1.0 {
                    return Self::PASSTHROUGH;
                }
                if f <= 0.0 {
                    return Self::SILENT;
                }
                let w0 = PI * f;
                let alpha = w0.sin() / (2.0 * 10f64.powf(q / 20.0));
                let cos_w0 = w0.cos();
                let b1 = 1.0 - cos_w0;
                Self::normalize(b1 / 2.0, b1, b1 / 2.0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            Topology::Highpass => {
                if f >= 1.0 {
                    return Self::SILENT;
                }
                if f <= 0.0 {
                    return Self::PASSTHROUGH;
                }
                let w0 = PI * f;
                let alpha = w0.sin() / (2.0 * 10f64.powf(q / 20.0));
                let cos_w0 = w0.cos();
                let b0 = (1.0 + cos_w0) / 2.0;
                Self::normalize(b0, -(1.0 + cos_w0), b0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            Topology::Bandpass => {
                if f <= 0.0 || f >= 1.0 {
                    return Self::SILENT;
                }
                // The transfer function tends to 1 as Q -> 0.
                if q <= 0.0 {
                    return Self::PASSTHROUGH;
                }
                let w0 = PI * f;
                let alpha = w0.sin() / (2.0 * q);
                let cos_w0 = w0.cos();
                Self::normalize(alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            Topology::Notch => {
                if f <= 0.0 || f >= 1.0 {
                    return Self::PASSTHROUGH;
                }
                // The transfer function tends to 0 as Q -> 0.
                if q <= 0.0 {
                    return Self::SILENT;
                }
                let w0 = PI * f;
                let alpha = w0.sin() / (2.0 * q);
                let cos_w0 = w0.cos();
                Self::normalize(1.0, -2.0 * cos_w0, 1.0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
        }
    }

    fn normalize(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Coefficients {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// A biquad IIR filter (2nd order) in Direct Form II Transposed.
///
/// Coefficients are fixed at construction; one instance filters one channel.
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    topology: Topology,
    coeffs: Coefficients,
    z1: f64,
    z2: f64,
}

impl BiquadFilter {
    pub fn new(topology: Topology, frequency: f64, q: f64, sample_rate: f64) -> Self {
        BiquadFilter {
            topology,
            coeffs: Coefficients::compute(topology, frequency, q, sample_rate),
            z1: 0.0,
            z2: 0.0,
        }
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn coefficients(&self) -> Coefficients {
        self.coeffs
    }

    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let c = &self.coeffs;
        let output = c.b0 * input + self.z1;
        self.z1 = c.b1 * input - c.a1 * output + self.z2;
        self.z2 = c.b2 * input - c.a2 * output;
        output
    }

    /// Filter a whole channel in place.
    pub fn process_block(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = self.process(*s as f64) as f32;
        }
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(f: &mut BiquadFilter, input: f64, n: usize) -> f64 {
        let mut out = 0.0;
        for _ in 0..n {
            out = f.process(input);
        }
        out
    }

    fn sine_peak(f: &mut BiquadFilter, freq: f64, sample_rate: f64) -> f64 {
        let mut peak = 0.0_f64;
        for i in 0..(sample_rate as usize / 10) {
            let t = i as f64 / sample_rate;
            let out = f.process((2.0 * PI * freq * t).sin());
            if i > 1000 {
                peak = peak.max(out.abs());
            }
        }
        peak
    }

    #[test]
    fn lowpass_passes_dc() {
        let mut f = BiquadFilter::new(Topology::Lowpass, 5500.0, DEFAULT_RESONANCE_DB, 44100.0);
        let out = settle(&mut f, 1.0, 2000);
        assert!((out - 1.0).abs() < 1e-3, "Lowpass should pass DC, got {out}");
    }

    #[test]
    fn highpass_blocks_dc() {
        let mut f = BiquadFilter::new(Topology::Highpass, 450.0, DEFAULT_RESONANCE_DB, 44100.0);
        let out = settle(&mut f, 1.0, 5000);
        assert!(out.abs() < 1e-3, "Highpass should block DC, got {out}");
    }

    #[test]
    fn lowpass_attenuates_high_freq() {
        let mut f = BiquadFilter::new(Topology::Lowpass, 3000.0, DEFAULT_RESONANCE_DB, 44100.0);
        let peak = sine_peak(&mut f, 15000.0, 44100.0);
        assert!(peak < 0.1, "Lowpass@3kHz should attenuate 15kHz, got {peak}");
    }

    #[test]
    fn notch_removes_center_frequency() {
        let mut f = BiquadFilter::new(Topology::Notch, 800.0, 10.0, 44100.0);
        let peak = sine_peak(&mut f, 800.0, 44100.0);
        assert!(peak < 0.05, "Notch should remove 800Hz, got {peak}");
    }

    #[test]
    fn bandpass_keeps_center_frequency() {
        let mut f = BiquadFilter::new(Topology::Bandpass, 1000.0, 5.0, 44100.0);
        let peak = sine_peak(&mut f, 1000.0, 44100.0);
        assert!((peak - 1.0).abs() < 0.05, "Bandpass should keep 1kHz, got {peak}");
    }

    #[test]
    fn zero_q_edge_cases() {
        assert_eq!(
            Coefficients::compute(Topology::Bandpass, 1000.0, 0.0, 44100.0),
            Coefficients::PASSTHROUGH
        );
        assert_eq!(
            Coefficients::compute(Topology::Notch, 800.0, 0.0, 44100.0),
            Coefficients::SILENT
        );
    }

    #[test]
    fn cutoff_above_nyquist() {
        // 8 kHz cutoff on 8 kHz material: nyquist is 4 kHz.
        assert_eq!(
            Coefficients::compute(Topology::Lowpass, 8000.0, DEFAULT_RESONANCE_DB, 8000.0),
            Coefficients::PASSTHROUGH
        );
        assert_eq!(
            Coefficients::compute(Topology::Highpass, 8000.0, DEFAULT_RESONANCE_DB, 8000.0),
            Coefficients::SILENT
        );
    }

    #[test]
    fn output_stays_finite() {
        let mut f = BiquadFilter::new(Topology::Bandpass, 1000.0, 0.1, 44100.0);
        for i in 0..10000 {
            let input = if i % 100 == 0 { 1.0 } else { 0.0 };
            let out = f.process(input);
            assert!(out.is_finite(), "Filter output not finite at sample {i}");
        }
    }

    #[test]
    fn reset_clears_state() {
        let mut f = BiquadFilter::new(Topology::Lowpass, 1000.0, DEFAULT_RESONANCE_DB, 44100.0);
        settle(&mut f, 1.0, 100);
        f.reset();
        let mut g = BiquadFilter::new(Topology::Lowpass, 1000.0, DEFAULT_RESONANCE_DB, 44100.0);
        assert_eq!(f.process(0.5), g.process(0.5));
    }
}
