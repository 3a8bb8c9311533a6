//! WAV encoder: serializes a PcmBuffer into a 16-bit PCM RIFF/WAVE file.

use super::pcm::PcmBuffer;

/// Size of the canonical RIFF + fmt + data headers.
pub const HEADER_LEN: usize = 44;
const BITS_PER_SAMPLE: u16 = 16;

/// Quantize one float sample to 16-bit.
///
/// The sample is clamped to [-1, 1]; negatives scale by 32768 and
/// non-negatives by 32767 so both rails map onto the i16 extremes.
#[inline]
pub fn quantize(sample: f32) -> i16 {
    let s = (sample as f64).clamp(-1.0, 1.0);
    let scaled = if s < 0.0 { s * 32768.0 } else { s * 32767.0 };
    scaled.round() as i16
}

/// Byte length of the data chunk for a buffer.
pub fn data_len(buffer: &PcmBuffer) -> usize {
    buffer.frame_count() * buffer.channel_count() * 2
}

/// Encode a buffer as a little-endian 16-bit PCM WAV file.
///
/// Total output length is always `44 + frames * channels * 2`.
///
/// The RIFF header stores the channel count in 16 bits and chunk sizes in
/// 32 bits, so buffers are limited to 65535 channels and a data chunk of
/// at most `u32::MAX - 36` bytes.
pub fn encode_wav(buffer: &PcmBuffer) -> Vec<u8> {
    debug_assert!(
        buffer.channel_count() <= u16::MAX as usize,
        "{} channels do not fit a WAV header",
        buffer.channel_count()
    );
    debug_assert!(
        data_len(buffer) <= (u32::MAX as usize) - (HEADER_LEN - 8),
        "{} data bytes do not fit a WAV header",
        data_len(buffer)
    );
    let channels = buffer.channel_count() as u16;
    let sample_rate = buffer.sample_rate();
    let byte_rate = sample_rate * channels as u32 * (BITS_PER_SAMPLE as u32 / 8);
    let block_align = channels * (BITS_PER_SAMPLE / 8);
    let data_size = data_len(buffer);
    let riff_size = (HEADER_LEN + data_size - 8) as u32;

    let mut buf = Vec::with_capacity(HEADER_LEN + data_size);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&riff_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&(data_size as u32).to_le_bytes());
    for sample in buffer.interleaved() {
        buf.extend_from_slice(&quantize(sample).to_le_bytes());
    }

    buf
}
