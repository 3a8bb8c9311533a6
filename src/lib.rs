pub mod analyzer;
pub mod artifact;
pub mod capture;
pub mod config;
pub mod dsp;
pub mod effect;
pub mod error;
pub mod orchestrator;
pub mod playback;
pub mod remote;
pub mod source;
pub mod visual;

#[cfg(test)]
mod testing;

use crate::dsp::offline::{FilterConfig, FilterKind, OfflineFilterEngine};
use crate::dsp::pcm::PcmBuffer;
use crate::effect::{Effect, Route};
use crate::source::AudioSource;
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the voxlab-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

fn parse_filter(filter: &str) -> Result<FilterKind, JsValue> {
    filter.parse().map_err(|e: String| JsValue::from_str(&e))
}

fn parse_effect(effect: &str) -> Result<Effect, JsValue> {
    effect.parse().map_err(|e: String| JsValue::from_str(&e))
}

/// WASM-exposed: frequency and resonance a filter preset uses at `intensity`.
#[wasm_bindgen]
pub fn filter_parameters(filter: &str, intensity: i32) -> Result<JsValue, JsValue> {
    let params = FilterConfig::new(parse_filter(filter)?, intensity).params();
    serde_wasm_bindgen::to_value(&params).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: decode encoded audio, run it through a filter preset and
/// return the result as a 16-bit WAV byte array.
#[wasm_bindgen]
pub fn render_filter_wav(bytes: &[u8], mime: &str, filter: &str, intensity: i32) -> Result<Vec<u8>, JsValue> {
    let config = FilterConfig::new(parse_filter(filter)?, intensity);
    let source = AudioSource::uploaded(bytes, mime);
    let rendered = OfflineFilterEngine::new()
        .render(&source, &config)
        .map_err(|e| JsValue::from_str(&format!("{e}")))?;
    Ok(dsp::wav::encode_wav(&rendered))
}

/// WASM-exposed: encode channel-major f32 samples (as rendered by an
/// OfflineAudioContext) to a 16-bit WAV byte array.
#[wasm_bindgen]
pub fn encode_wav_planar(samples: &[f32], channels: usize, sample_rate: u32) -> Result<Vec<u8>, JsValue> {
    let buffer = PcmBuffer::from_planar(samples, channels, sample_rate)
        .map_err(|e| JsValue::from_str(&format!("{e}")))?;
    Ok(dsp::wav::encode_wav(&buffer))
}

/// WASM-exposed: `"local"` or `"remote"`, depending on where an effect runs.
#[wasm_bindgen]
pub fn effect_route(effect: &str) -> Result<String, JsValue> {
    Ok(match parse_effect(effect)?.route() {
        Route::Local(_) => "local".to_string(),
        Route::Remote(_) => "remote".to_string(),
    })
}

/// WASM-exposed: file name offered when downloading an effect result.
#[wasm_bindgen]
pub fn download_name(effect: &str) -> Result<String, JsValue> {
    Ok(artifact::download_name(parse_effect(effect)?.id()))
}
