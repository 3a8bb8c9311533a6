//! Planar floating-point PCM buffer.

use crate::error::BufferError;

/// Decoded or rendered audio: one `f32` sample vector per channel, all of
/// equal length, sharing one sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl PcmBuffer {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self, BufferError> {
        if sample_rate == 0 {
            return Err(BufferError::ZeroSampleRate);
        }
        let Some(first) = channels.first() else {
            return Err(BufferError::NoChannels);
        };
        let expected = first.len();
        for (channel, data) in channels.iter().enumerate() {
            if data.len() != expected {
                return Err(BufferError::RaggedChannels {
                    channel,
                    expected,
                    found: data.len(),
                });
            }
        }
        Ok(PcmBuffer {
            sample_rate,
            channels,
        })
    }

    /// A buffer of `frames` zero samples per channel.
    pub fn silence(channel_count: usize, frames: usize, sample_rate: u32) -> Result<Self, BufferError> {
        PcmBuffer::new(sample_rate, vec![vec![0.0; frames]; channel_count])
    }

    /// Split interleaved samples into channels. Trailing samples that do not
    /// fill a whole frame are dropped.
    pub fn from_interleaved(
        samples: &[f32],
        channel_count: usize,
        sample_rate: u32,
    ) -> Result<Self, BufferError> {
        if channel_count == 0 {
            return Err(BufferError::NoChannels);
        }
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (ch, &s) in frame.iter().enumerate() {
                channels[ch].push(s);
            }
        }
        PcmBuffer::new(sample_rate, channels)
    }

    /// Split channel-major samples (all of channel 0, then all of channel 1,
    /// ...) into channels.
    pub fn from_planar(samples: &[f32], channel_count: usize, sample_rate: u32) -> Result<Self, BufferError> {
        if channel_count == 0 {
            return Err(BufferError::NoChannels);
        }
        let frames = samples.len() / channel_count;
        let leftover = samples.len() % channel_count;
        if leftover != 0 {
            return Err(BufferError::RaggedChannels {
                channel: channel_count - 1,
                expected: frames,
                found: frames + leftover,
            });
        }
        let channels = if frames == 0 {
            vec![Vec::new(); channel_count]
        } else {
            samples.chunks_exact(frames).map(<[f32]>::to_vec).collect()
        };
        PcmBuffer::new(sample_rate, channels)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Samples ordered frame by frame, channel by channel.
    pub fn interleaved(&self) -> impl Iterator<Item = f32> + '_ {
        (0..self.frame_count()).flat_map(move |frame| self.channels.iter().map(move |ch| ch[frame]))
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }
}
