//! DSP layer: a pure-Rust stand-in for the browser's audio context.
//!
//! The same graph drives the WASM build (samples pulled by an AudioWorklet)
//! and the CLI renderer (offline WAV export).

pub mod buffer;
pub mod context;
pub mod convolver;
pub mod decode;
pub mod oscillator;
pub mod renderer;

pub use buffer::AudioBuffer;
pub use context::{
    AudioContext, AudioNode, BufferSourceNode, ConvolverNode, Destination, NodeId,
    OscillatorNode, PlaybackState, ScheduledSourceNode,
};
pub use oscillator::Waveform;
