//! WAV renderer: pulls frames from an `AudioContext` into a WAV byte buffer.

use std::io::Cursor;

use super::context::AudioContext;

/// Render `frames` frames from the context to a 16-bit mono WAV file as bytes.
pub fn render_wav(context: &AudioContext, frames: usize) -> Result<Vec<u8>, hound::Error> {
    let samples = context.render(frames);
    encode_wav(&samples, context.sample_rate().round() as u32)
}

/// Encode mono f32 samples in [-1, 1] as 16-bit PCM WAV bytes.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &s in samples {
            writer.write_sample(to_i16(s))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}
