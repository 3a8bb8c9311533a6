//! Offline audio processing.
//!
//! Decoding, biquad filtering, spectrum analysis and WAV encoding all run
//! on plain sample buffers so the same code serves the browser (via WASM)
//! and native tests.

pub mod decode;
pub mod filter;
pub mod offline;
pub mod pcm;
pub mod spectrum;
pub mod wav;
