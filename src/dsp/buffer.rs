//! Decoded audio held in memory, and a cursor that plays it back at the
//! context rate.

use std::sync::Arc;

/// Decoded PCM audio, one `Vec<f32>` per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Arc<[Vec<f32>]>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Build a buffer from per-channel sample data. Channels shorter than the
    /// first are padded with silence.
    pub fn new(mut channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let len = channels.first().map_or(0, Vec::len);
        for ch in channels.iter_mut() {
            ch.resize(len, 0.0);
        }
        AudioBuffer {
            channels: channels.into(),
            sample_rate,
        }
    }

    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(vec![samples], sample_rate)
    }

    /// Split interleaved 16-bit PCM into channels.
    pub fn from_interleaved_i16(pcm: &[i16], channels: usize, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let mut data = vec![Vec::with_capacity(pcm.len() / channels); channels];
        for frame in pcm.chunks_exact(channels) {
            for (ch, &s) in frame.iter().enumerate() {
                data[ch].push(s as f32 / 32768.0);
            }
        }
        Self::new(data, sample_rate)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    /// Length in sample frames.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    pub fn channel_data(&self, channel: usize) -> Option<&[f32]> {
        self.channels.get(channel).map(Vec::as_slice)
    }

    /// Average of all channels at one frame.
    pub fn mono_at(&self, frame: usize) -> f32 {
        if self.channels.is_empty() {
            return 0.0;
        }
        let sum: f32 = self
            .channels
            .iter()
            .map(|ch| ch.get(frame).copied().unwrap_or(0.0))
            .sum();
        sum / self.channels.len() as f32
    }

    /// Mono mixdown of the whole buffer.
    pub fn to_mono(&self) -> Vec<f32> {
        (0..self.len()).map(|i| self.mono_at(i)).collect()
    }

    /// Read the mono mixdown at a fractional frame position with linear
    /// interpolation. Positions past the end read as silence.
    pub fn read_interpolated(&self, position: f64) -> f64 {
        let len = self.len();
        if len == 0 || position < 0.0 {
            return 0.0;
        }

        let idx = position as usize;
        if idx + 1 >= len {
            return if idx < len {
                self.mono_at(idx) as f64
            } else {
                0.0
            };
        }

        let frac = position - idx as f64;
        self.mono_at(idx) as f64 * (1.0 - frac) + self.mono_at(idx + 1) as f64 * frac
    }
}

/// Playback cursor over an `AudioBuffer`.
#[derive(Debug, Clone)]
pub struct BufferPlayer {
    buffer: AudioBuffer,
    position: f64,
    /// Buffer frames advanced per output frame.
    rate: f64,
    pub looping: bool,
}

impl BufferPlayer {
    pub fn new(buffer: AudioBuffer, output_sample_rate: f64) -> Self {
        let rate = buffer.sample_rate() as f64 / output_sample_rate;
        BufferPlayer {
            buffer,
            position: 0.0,
            rate,
            looping: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        !self.looping && self.position >= self.buffer.len() as f64
    }

    /// Next output sample; `None` once a non-looping buffer has run out.
    pub fn next_sample(&mut self) -> Option<f64> {
        let len = self.buffer.len() as f64;
        if len == 0.0 {
            return None;
        }
        if self.position >= len {
            if !self.looping {
                return None;
            }
            self.position %= len;
        }

        let sample = self.buffer.read_interpolated(self.position);
        self.position += self.rate;
        Some(sample)
    }
}
