use crate::dsp::context::{NodeId, PlaybackState};
use std::fmt;

/// Failures raised by the audio context and the components built on it.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// A node was asked to `start` or `stop` from a state that does not allow it.
    InvalidState {
        node: NodeId,
        operation: &'static str,
        state: PlaybackState,
    },
    /// A connection target is missing from the graph.
    UnknownNode(NodeId),
    /// Sources may feed the output or a convolver; convolvers may only feed the output.
    InvalidConnection { from: NodeId, to: NodeId },
    /// A buffer-driven component was triggered before a buffer was supplied.
    MissingBuffer,
    /// The octave multiplier must be a positive integer.
    InvalidOctave(u32),
    /// Sample rates must be finite and positive.
    InvalidSampleRate(f64),
}

/// Failures while turning encoded bytes into an `AudioBuffer`.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    Empty,
    UnsupportedFormat,
    Wav(String),
    Mp3(String),
    NoAudio,
}

/// Failures while downloading a remote resource.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    Network(String),
    Status(u16),
}

/// Outcome of a failed reverb pipeline run. Nothing is played when one of these is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum ReverbError {
    Fetch { url: String, source: FetchError },
    Decode { url: String, source: DecodeError },
    Playback(AudioError),
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::InvalidState { node, operation, state } => {
                write!(f, "Cannot {operation} node {node} in state {state:?}")
            }
            AudioError::UnknownNode(node) => write!(f, "Node {node} is not part of this context"),
            AudioError::InvalidConnection { from, to } => {
                write!(f, "Node {from} cannot be connected to node {to}")
            }
            AudioError::MissingBuffer => write!(f, "No audio buffer has been supplied"),
            AudioError::InvalidOctave(octave) => {
                write!(f, "Octave multiplier must be positive, got {octave}")
            }
            AudioError::InvalidSampleRate(rate) => {
                write!(f, "Sample rate must be a finite positive number, got {rate}")
            }
        }
    }
}

impl std::error::Error for AudioError {}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Empty => write!(f, "Audio data is empty"),
            DecodeError::UnsupportedFormat => write!(f, "Audio data is in an unsupported format"),
            DecodeError::Wav(e) => write!(f, "WAV decode error: {e}"),
            DecodeError::Mp3(e) => write!(f, "MP3 decode error: {e}"),
            DecodeError::NoAudio => write!(f, "Audio data contains no samples"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Network(e) => write!(f, "Network error: {e}"),
            FetchError::Status(code) => write!(f, "Unexpected HTTP status {code}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl fmt::Display for ReverbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReverbError::Fetch { url, source } => write!(f, "Failed to download {url}: {source}"),
            ReverbError::Decode { url, source } => write!(f, "Failed to decode {url}: {source}"),
            ReverbError::Playback(e) => write!(f, "Failed to start playback: {e}"),
        }
    }
}

impl std::error::Error for ReverbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReverbError::Fetch { source, .. } => Some(source),
            ReverbError::Decode { source, .. } => Some(source),
            ReverbError::Playback(e) => Some(e),
        }
    }
}

impl From<AudioError> for ReverbError {
    fn from(e: AudioError) -> Self {
        ReverbError::Playback(e)
    }
}

impl From<hound::Error> for DecodeError {
    fn from(e: hound::Error) -> Self {
        DecodeError::Wav(e.to_string())
    }
}

#[cfg(feature = "mp3")]
impl From<minimp3::Error> for DecodeError {
    fn from(e: minimp3::Error) -> Self {
        DecodeError::Mp3(format!("{e:?}"))
    }
}

#[cfg(feature = "net")]
impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => FetchError::Status(status.as_u16()),
            None => FetchError::Network(e.to_string()),
        }
    }
}
