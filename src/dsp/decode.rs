//! Decode encoded audio bytes into a PcmBuffer.
//!
//! WAV is always available through `hound`; MP3 needs the `mp3` feature.
//! The container is sniffed from the payload, the mime hint is only used
//! for error reporting.

use std::io::Cursor;

use log::debug;

use super::pcm::PcmBuffer;
use crate::error::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Wav,
    Mp3,
}

/// Identify the container from its magic bytes.
pub fn sniff(bytes: &[u8]) -> Option<Container> {
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
        return Some(Container::Wav);
    }
    if bytes.starts_with(b"ID3") {
        return Some(Container::Mp3);
    }
    // MPEG audio frame sync: 11 set bits.
    if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0 {
        return Some(Container::Mp3);
    }
    None
}

/// Decode a payload at its native channel count and sample rate.
pub fn decode(bytes: &[u8], mime: &str) -> Result<PcmBuffer, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    let buffer = match sniff(bytes) {
        Some(Container::Wav) => decode_wav(bytes)?,
        Some(Container::Mp3) => decode_mp3(bytes, mime)?,
        None => {
            return Err(DecodeError::Unsupported {
                mime: mime.to_string(),
            })
        }
    };
    if buffer.frame_count() == 0 {
        return Err(DecodeError::Empty);
    }
    debug!(
        "decoded {} bytes: {} ch @ {} Hz, {} frames",
        bytes.len(),
        buffer.channel_count(),
        buffer.sample_rate(),
        buffer.frame_count()
    );
    Ok(buffer)
}

fn decode_wav(bytes: &[u8]) -> Result<PcmBuffer, DecodeError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes)).map_err(malformed)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(malformed)?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .map_err(malformed)?
        }
    };

    PcmBuffer::from_interleaved(&interleaved, spec.channels as usize, spec.sample_rate)
        .map_err(|e| DecodeError::Malformed(e.to_string()))
}

#[cfg(feature = "mp3")]
fn decode_mp3(bytes: &[u8], _mime: &str) -> Result<PcmBuffer, DecodeError> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(bytes));
    let mut format: Option<(usize, i32)> = None;
    let mut interleaved: Vec<f32> = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if frame.data.is_empty() {
                    continue;
                }
                match format {
                    None => format = Some((frame.channels, frame.sample_rate)),
                    Some(f) if f != (frame.channels, frame.sample_rate) => {
                        return Err(DecodeError::InconsistentStream);
                    }
                    Some(_) => {}
                }
                interleaved.extend(frame.data.iter().map(|&s| s as f32 / 32768.0));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(DecodeError::Malformed(e.to_string())),
        }
    }

    let (channels, sample_rate) = format.ok_or(DecodeError::Empty)?;
    if sample_rate <= 0 {
        return Err(DecodeError::Malformed(format!("bad sample rate {sample_rate}")));
    }
    PcmBuffer::from_interleaved(&interleaved, channels, sample_rate as u32)
        .map_err(|e| DecodeError::Malformed(e.to_string()))
}

#[cfg(not(feature = "mp3"))]
fn decode_mp3(_bytes: &[u8], mime: &str) -> Result<PcmBuffer, DecodeError> {
    Err(DecodeError::Unsupported {
        mime: mime.to_string(),
    })
}

fn malformed(e: hound::Error) -> DecodeError {
    DecodeError::Malformed(e.to_string())
}
