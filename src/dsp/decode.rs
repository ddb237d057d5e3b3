//! Decoding of encoded audio files into `AudioBuffer`s.
//!
//! WAV is handled by `hound`; MP3 by `minimp3` when the `mp3` feature is on.

use std::io::Cursor;

use crate::error::DecodeError;

use super::buffer::AudioBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Wav,
    Mp3,
}

/// Sniff the container from magic bytes.
pub fn detect_container(bytes: &[u8]) -> Option<Container> {
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
        return Some(Container::Wav);
    }
    // ID3v2 tag, or an MPEG audio frame sync
    if bytes.starts_with(b"ID3") || (bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0)
    {
        return Some(Container::Mp3);
    }
    None
}

pub fn decode(bytes: &[u8]) -> Result<AudioBuffer, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    match detect_container(bytes) {
        Some(Container::Wav) => decode_wav(bytes),
        Some(Container::Mp3) => decode_mp3(bytes),
        None => Err(DecodeError::UnsupportedFormat),
    }
}

fn decode_wav(bytes: &[u8]) -> Result<AudioBuffer, DecodeError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    if interleaved.is_empty() {
        return Err(DecodeError::NoAudio);
    }

    let mut data = vec![Vec::with_capacity(interleaved.len() / channels); channels];
    for frame in interleaved.chunks_exact(channels) {
        for (ch, &s) in frame.iter().enumerate() {
            data[ch].push(s);
        }
    }
    Ok(AudioBuffer::new(data, spec.sample_rate))
}

#[cfg(feature = "mp3")]
fn decode_mp3(bytes: &[u8]) -> Result<AudioBuffer, DecodeError> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(bytes));
    let mut pcm: Vec<i16> = Vec::new();
    let mut format: Option<(usize, u32)> = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                // Keep the format of the first frame; later frames with a
                // different layout are skipped.
                let frame_format = (frame.channels, frame.sample_rate as u32);
                match format {
                    None => format = Some(frame_format),
                    Some(f) if f != frame_format => continue,
                    Some(_) => {}
                }
                pcm.extend_from_slice(&frame.data);
            }
            Err(minimp3::Error::Eof) => break,
            Err(minimp3::Error::SkippedData) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    match format {
        Some((channels, sample_rate)) if !pcm.is_empty() => Ok(
            AudioBuffer::from_interleaved_i16(&pcm, channels, sample_rate),
        ),
        _ => Err(DecodeError::NoAudio),
    }
}

#[cfg(not(feature = "mp3"))]
fn decode_mp3(_bytes: &[u8]) -> Result<AudioBuffer, DecodeError> {
    Err(DecodeError::UnsupportedFormat)
}
