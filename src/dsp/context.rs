//! Audio context: a small node graph rendered offline, frame by frame.
//!
//! Mirrors the slice of the Web Audio API the demos use: oscillators, buffer
//! sources and convolvers, connected to a single mono output. The context is
//! a cheaply clonable handle; every clone and every node handle shares the
//! same graph. It is single-threaded (`Rc<RefCell<..>>`).

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use log::{debug, trace};

use crate::error::{AudioError, DecodeError};

use super::buffer::{AudioBuffer, BufferPlayer};
use super::convolver::Convolver;
use super::decode;
use super::oscillator::{Oscillator, Waveform};

// ── Identifiers & States ────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a scheduled source node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Created, not yet started.
    Scheduled,
    Playing,
    /// Stopped explicitly, or a non-looping buffer ran out.
    Stopped,
}

/// Where a node's output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Output,
    Node(NodeId),
}

// ── Graph ───────────────────────────────────────────────────

enum Kind {
    Oscillator(Oscillator),
    BufferSource {
        buffer: Option<AudioBuffer>,
        looping: bool,
        player: Option<BufferPlayer>,
    },
    Convolver {
        convolver: Convolver,
        /// Set once a source has been connected to it.
        fed: bool,
    },
}

impl Kind {
    fn is_source(&self) -> bool {
        !matches!(self, Kind::Convolver { .. })
    }
}

struct NodeEntry {
    kind: Kind,
    state: PlaybackState,
    outputs: Vec<Destination>,
}

struct Graph {
    sample_rate: f64,
    frame: u64,
    next_id: u64,
    nodes: BTreeMap<NodeId, NodeEntry>,
    /// Per-frame convolver inputs, reused across frames.
    sends: HashMap<NodeId, f64>,
}

impl Graph {
    fn insert(&mut self, kind: Kind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        let state = if kind.is_source() {
            PlaybackState::Scheduled
        } else {
            PlaybackState::Playing
        };
        self.nodes.insert(
            id,
            NodeEntry {
                kind,
                state,
                outputs: Vec::new(),
            },
        );
        id
    }

    fn render_frame(&mut self) -> f32 {
        let mut mix = 0.0f64;
        self.sends.clear();

        for (id, node) in self.nodes.iter_mut() {
            if node.state != PlaybackState::Playing || !node.kind.is_source() {
                continue;
            }
            let sample = match &mut node.kind {
                Kind::Oscillator(osc) => Some(osc.next_sample()),
                Kind::BufferSource { player: Some(p), .. } => p.next_sample(),
                // Started without a buffer: silent until one is set.
                Kind::BufferSource { player: None, .. } => Some(0.0),
                Kind::Convolver { .. } => None,
            };
            let Some(sample) = sample else {
                debug!("buffer source {id} ended");
                node.state = PlaybackState::Stopped;
                continue;
            };
            for dest in &node.outputs {
                match dest {
                    Destination::Output => mix += sample,
                    Destination::Node(target) => *self.sends.entry(*target).or_default() += sample,
                }
            }
        }

        for (id, node) in self.nodes.iter_mut() {
            if let Kind::Convolver { convolver, .. } = &mut node.kind {
                let input = self.sends.get(id).copied().unwrap_or(0.0);
                let wet = convolver.process(input as f32) as f64;
                if node.outputs.contains(&Destination::Output) {
                    mix += wet;
                }
            }
        }

        self.frame += 1;
        mix.clamp(-1.0, 1.0) as f32
    }

    /// Drop stopped sources; their handles report `Stopped` from then on.
    /// Then drop convolvers that were fed once, have no source left feeding
    /// them, and have rung out.
    fn prune(&mut self) {
        self.nodes
            .retain(|_, n| !(n.kind.is_source() && n.state == PlaybackState::Stopped));

        let fed: HashSet<NodeId> = self
            .nodes
            .values()
            .flat_map(|n| &n.outputs)
            .filter_map(|dest| match dest {
                Destination::Node(id) => Some(*id),
                Destination::Output => None,
            })
            .collect();
        self.nodes.retain(|id, n| match &n.kind {
            Kind::Convolver { convolver, fed: was_fed } => {
                let keep = !was_fed || fed.contains(id) || convolver.is_ringing();
                if !keep {
                    debug!("convolver {id} released");
                }
                keep
            }
            _ => true,
        });
    }
}

// ── Context ─────────────────────────────────────────────────

#[derive(Clone)]
pub struct AudioContext {
    graph: Rc<RefCell<Graph>>,
}

impl fmt::Debug for AudioContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let graph = self.graph.borrow();
        f.debug_struct("AudioContext")
            .field("sample_rate", &graph.sample_rate)
            .field("frame", &graph.frame)
            .field("nodes", &graph.nodes.len())
            .finish()
    }
}

impl AudioContext {
    /// Fails with `InvalidSampleRate` unless `sample_rate` is finite and positive.
    pub fn new(sample_rate: f64) -> Result<Self, AudioError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(AudioError::InvalidSampleRate(sample_rate));
        }
        Ok(AudioContext {
            graph: Rc::new(RefCell::new(Graph {
                sample_rate,
                frame: 0,
                next_id: 0,
                nodes: BTreeMap::new(),
                sends: HashMap::new(),
            })),
        })
    }

    pub fn sample_rate(&self) -> f64 {
        self.graph.borrow().sample_rate
    }

    /// Seconds of audio rendered so far.
    pub fn current_time(&self) -> f64 {
        let graph = self.graph.borrow();
        graph.frame as f64 / graph.sample_rate
    }

    pub fn destination(&self) -> Destination {
        Destination::Output
    }

    /// Whether two handles share one graph.
    pub fn same_context(&self, other: &AudioContext) -> bool {
        Rc::ptr_eq(&self.graph, &other.graph)
    }

    pub fn create_oscillator(&self) -> OscillatorNode {
        let sample_rate = self.sample_rate();
        let id = self
            .graph
            .borrow_mut()
            .insert(Kind::Oscillator(Oscillator::new(sample_rate)));
        OscillatorNode {
            id,
            context: self.clone(),
        }
    }

    pub fn create_buffer_source(&self) -> BufferSourceNode {
        let id = self.graph.borrow_mut().insert(Kind::BufferSource {
            buffer: None,
            looping: false,
            player: None,
        });
        BufferSourceNode {
            id,
            context: self.clone(),
        }
    }

    pub fn create_convolver(&self) -> ConvolverNode {
        let id = self
            .graph
            .borrow_mut()
            .insert(Kind::Convolver {
                convolver: Convolver::new(),
                fed: false,
            });
        ConvolverNode {
            id,
            context: self.clone(),
        }
    }

    /// Decode an encoded audio file (WAV, or MP3 with the `mp3` feature).
    pub fn decode_audio_data(&self, bytes: &[u8]) -> Result<AudioBuffer, DecodeError> {
        let buffer = decode::decode(bytes)?;
        debug!(
            "decoded {} bytes: {} frames, {} ch @ {} Hz",
            bytes.len(),
            buffer.len(),
            buffer.number_of_channels(),
            buffer.sample_rate()
        );
        Ok(buffer)
    }

    /// Render `frames` mono samples and advance `current_time`.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut graph = self.graph.borrow_mut();
        let out: Vec<f32> = (0..frames).map(|_| graph.render_frame()).collect();
        graph.prune();
        out
    }

    /// Number of source nodes currently playing.
    pub fn active_sources(&self) -> usize {
        self.graph
            .borrow()
            .nodes
            .values()
            .filter(|n| n.kind.is_source() && n.state == PlaybackState::Playing)
            .count()
    }

    /// Number of nodes still held by the graph, sources and convolvers alike.
    pub fn node_count(&self) -> usize {
        self.graph.borrow().nodes.len()
    }

    fn state_of(&self, id: NodeId) -> PlaybackState {
        self.graph
            .borrow()
            .nodes
            .get(&id)
            .map_or(PlaybackState::Stopped, |n| n.state)
    }

    fn connect(&self, from: NodeId, to: Destination) -> Result<(), AudioError> {
        let mut graph = self.graph.borrow_mut();
        let from_is_source = match graph.nodes.get(&from) {
            Some(n) => n.kind.is_source(),
            // Pruned sources have stopped; connecting them changes nothing.
            None => return Ok(()),
        };

        if let Destination::Node(target) = to {
            match graph.nodes.get(&target) {
                None => return Err(AudioError::UnknownNode(target)),
                Some(n) if n.kind.is_source() || !from_is_source => {
                    return Err(AudioError::InvalidConnection { from, to: target });
                }
                Some(_) => {}
            }
        }

        if let Some(node) = graph.nodes.get_mut(&from) {
            if !node.outputs.contains(&to) {
                node.outputs.push(to);
            }
        }
        if let Destination::Node(target) = to {
            if let Some(NodeEntry {
                kind: Kind::Convolver { fed, .. },
                ..
            }) = graph.nodes.get_mut(&target)
            {
                *fed = true;
            }
        }
        trace!("connected {from} -> {to:?}");
        Ok(())
    }

    fn disconnect(&self, from: NodeId) {
        if let Some(node) = self.graph.borrow_mut().nodes.get_mut(&from) {
            node.outputs.clear();
        }
    }

    fn start(&self, id: NodeId) -> Result<(), AudioError> {
        let mut graph = self.graph.borrow_mut();
        let sample_rate = graph.sample_rate;
        let Some(node) = graph.nodes.get_mut(&id) else {
            return Err(AudioError::InvalidState {
                node: id,
                operation: "start",
                state: PlaybackState::Stopped,
            });
        };
        if node.state != PlaybackState::Scheduled {
            return Err(AudioError::InvalidState {
                node: id,
                operation: "start",
                state: node.state,
            });
        }

        if let Kind::BufferSource {
            buffer,
            looping,
            player,
        } = &mut node.kind
        {
            *player = buffer.clone().map(|b| {
                let mut p = BufferPlayer::new(b, sample_rate);
                p.looping = *looping;
                p
            });
        }
        node.state = PlaybackState::Playing;
        debug!("started node {id}");
        Ok(())
    }

    fn stop(&self, id: NodeId) -> Result<(), AudioError> {
        let mut graph = self.graph.borrow_mut();
        let Some(node) = graph.nodes.get_mut(&id) else {
            return Ok(());
        };
        match node.state {
            PlaybackState::Scheduled => Err(AudioError::InvalidState {
                node: id,
                operation: "stop",
                state: node.state,
            }),
            PlaybackState::Playing => {
                node.state = PlaybackState::Stopped;
                debug!("stopped node {id}");
                Ok(())
            }
            PlaybackState::Stopped => Ok(()),
        }
    }

    fn with_kind<R>(&self, id: NodeId, f: impl FnOnce(&mut Kind) -> R) -> Option<R> {
        self.graph
            .borrow_mut()
            .nodes
            .get_mut(&id)
            .map(|n| f(&mut n.kind))
    }
}

// ── Node Handles ────────────────────────────────────────────

/// Common behaviour of node handles.
pub trait AudioNode {
    fn id(&self) -> NodeId;

    fn context(&self) -> &AudioContext;

    fn connect(&self, destination: impl Into<Destination>) -> Result<(), AudioError> {
        self.context().connect(self.id(), destination.into())
    }

    fn disconnect(&self) {
        self.context().disconnect(self.id());
    }
}

/// Source nodes with a one-shot `start`/`stop` lifecycle.
///
/// `start` is only valid once, from `Scheduled`. `stop` before `start` is an
/// `InvalidState` error; stopping an already stopped node is a no-op.
pub trait ScheduledSourceNode: AudioNode {
    fn start(&self) -> Result<(), AudioError> {
        self.context().start(self.id())
    }

    fn stop(&self) -> Result<(), AudioError> {
        self.context().stop(self.id())
    }

    fn playback_state(&self) -> PlaybackState {
        self.context().state_of(self.id())
    }
}

#[derive(Debug, Clone)]
pub struct OscillatorNode {
    id: NodeId,
    context: AudioContext,
}

impl OscillatorNode {
    pub fn set_type(&self, waveform: Waveform) {
        self.context.with_kind(self.id, |k| {
            if let Kind::Oscillator(osc) = k {
                osc.waveform = waveform;
            }
        });
    }

    pub fn waveform(&self) -> Option<Waveform> {
        self.context.with_kind(self.id, |k| match k {
            Kind::Oscillator(osc) => Some(osc.waveform),
            _ => None,
        })?
    }

    pub fn set_frequency(&self, frequency: f64) {
        self.context.with_kind(self.id, |k| {
            if let Kind::Oscillator(osc) = k {
                osc.frequency = frequency;
            }
        });
    }

    /// Current frequency; `None` once the node has been stopped and released.
    pub fn frequency(&self) -> Option<f64> {
        self.context.with_kind(self.id, |k| match k {
            Kind::Oscillator(osc) => Some(osc.frequency),
            _ => None,
        })?
    }
}

#[derive(Debug, Clone)]
pub struct BufferSourceNode {
    id: NodeId,
    context: AudioContext,
}

impl BufferSourceNode {
    /// Attach the buffer to play. Setting it after `start` begins playback of
    /// the new buffer from its start.
    pub fn set_buffer(&self, new_buffer: AudioBuffer) {
        let sample_rate = self.context.sample_rate();
        let playing = self.playback_state() == PlaybackState::Playing;
        self.context.with_kind(self.id, |k| {
            if let Kind::BufferSource {
                buffer,
                looping,
                player,
            } = k
            {
                if playing {
                    let mut p = BufferPlayer::new(new_buffer.clone(), sample_rate);
                    p.looping = *looping;
                    *player = Some(p);
                }
                *buffer = Some(new_buffer);
            }
        });
    }

    pub fn set_loop(&self, enabled: bool) {
        self.context.with_kind(self.id, |k| {
            if let Kind::BufferSource {
                looping, player, ..
            } = k
            {
                *looping = enabled;
                if let Some(p) = player {
                    p.looping = enabled;
                }
            }
        });
    }
}

#[derive(Debug, Clone)]
pub struct ConvolverNode {
    id: NodeId,
    context: AudioContext,
}

impl ConvolverNode {
    /// Load the impulse response, resampled to the context rate.
    pub fn set_buffer(&self, impulse_response: &AudioBuffer) {
        let sample_rate = self.context.sample_rate();
        self.context.with_kind(self.id, |k| {
            if let Kind::Convolver { convolver, .. } = k {
                convolver.set_impulse_response(impulse_response, sample_rate);
            }
        });
    }

    /// Takes effect on the next `set_buffer`.
    pub fn set_normalize(&self, normalize: bool) {
        self.context.with_kind(self.id, |k| {
            if let Kind::Convolver { convolver, .. } = k {
                convolver.normalize = normalize;
            }
        });
    }
}

macro_rules! impl_audio_node {
    ($($node:ty),*) => {
        $(
            impl AudioNode for $node {
                fn id(&self) -> NodeId {
                    self.id
                }

                fn context(&self) -> &AudioContext {
                    &self.context
                }
            }
        )*
    };
}

impl_audio_node!(OscillatorNode, BufferSourceNode, ConvolverNode);

impl ScheduledSourceNode for OscillatorNode {}
impl ScheduledSourceNode for BufferSourceNode {}

impl From<&ConvolverNode> for Destination {
    fn from(node: &ConvolverNode) -> Self {
        Destination::Node(node.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oscillator_defaults_and_setters() {
        let ctx = AudioContext::new(44100.0).unwrap();
        let osc = ctx.create_oscillator();
        assert_eq!(osc.waveform(), Some(Waveform::Square));
        osc.set_type(Waveform::Sine);
        osc.set_frequency(65.4);
        assert_eq!(osc.waveform(), Some(Waveform::Sine));
        assert_eq!(osc.frequency(), Some(65.4));
        assert_eq!(osc.playback_state(), PlaybackState::Scheduled);
    }

    #[test]
    fn stop_before_start_is_invalid_state() {
        let ctx = AudioContext::new(44100.0).unwrap();
        let osc = ctx.create_oscillator();
        let err = osc.stop().unwrap_err();
        assert!(matches!(
            err,
            AudioError::InvalidState {
                operation: "stop",
                state: PlaybackState::Scheduled,
                ..
            }
        ));
    }

    #[test]
    fn start_twice_is_invalid_state() {
        let ctx = AudioContext::new(44100.0).unwrap();
        let osc = ctx.create_oscillator();
        osc.start().unwrap();
        assert!(matches!(
            osc.start(),
            Err(AudioError::InvalidState {
                operation: "start",
                ..
            })
        ));
    }

    #[test]
    fn repeated_stop_is_a_no_op() {
        let ctx = AudioContext::new(44100.0).unwrap();
        let osc = ctx.create_oscillator();
        osc.start().unwrap();
        osc.stop().unwrap();
        osc.stop().unwrap();
        assert_eq!(osc.playback_state(), PlaybackState::Stopped);
    }

    #[test]
    fn unconnected_source_is_silent() {
        let ctx = AudioContext::new(8000.0).unwrap();
        let osc = ctx.create_oscillator();
        osc.start().unwrap();
        assert!(ctx.render(64).iter().all(|&s| s == 0.0));
        assert_eq!(ctx.active_sources(), 1);
    }

    #[test]
    fn connected_oscillator_reaches_output() {
        let ctx = AudioContext::new(8000.0).unwrap();
        let osc = ctx.create_oscillator();
        osc.set_frequency(100.0);
        osc.connect(ctx.destination()).unwrap();
        osc.start().unwrap();
        let out = ctx.render(800);
        assert!(out.iter().any(|&s| s.abs() > 0.5));
        assert!((ctx.current_time() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn stopped_sources_are_released_after_render() {
        let ctx = AudioContext::new(8000.0).unwrap();
        let osc = ctx.create_oscillator();
        osc.connect(ctx.destination()).unwrap();
        osc.start().unwrap();
        osc.stop().unwrap();
        assert!(ctx.render(16).iter().all(|&s| s == 0.0));
        assert_eq!(osc.frequency(), None);
        assert_eq!(osc.playback_state(), PlaybackState::Stopped);
        assert!(osc.start().is_err());
    }

    #[test]
    fn buffer_source_plays_once_then_ends() {
        let ctx = AudioContext::new(8000.0).unwrap();
        let src = ctx.create_buffer_source();
        src.set_buffer(AudioBuffer::from_mono(vec![0.25; 4], 8000));
        src.connect(ctx.destination()).unwrap();
        src.start().unwrap();
        let out = ctx.render(6);
        assert_eq!(out, vec![0.25, 0.25, 0.25, 0.25, 0.0, 0.0]);
        assert_eq!(src.playback_state(), PlaybackState::Stopped);
        assert_eq!(ctx.active_sources(), 0);
    }

    #[test]
    fn looping_buffer_source_keeps_playing() {
        let ctx = AudioContext::new(8000.0).unwrap();
        let src = ctx.create_buffer_source();
        src.set_buffer(AudioBuffer::from_mono(vec![0.5, -0.5], 8000));
        src.set_loop(true);
        src.connect(ctx.destination()).unwrap();
        src.start().unwrap();
        assert_eq!(ctx.render(5), vec![0.5, -0.5, 0.5, -0.5, 0.5]);
        assert_eq!(src.playback_state(), PlaybackState::Playing);
    }

    #[test]
    fn convolver_routes_wet_signal() {
        let ctx = AudioContext::new(8000.0).unwrap();
        let conv = ctx.create_convolver();
        conv.set_normalize(false);
        conv.set_buffer(&AudioBuffer::from_mono(vec![0.0, 0.5], 8000));
        conv.connect(ctx.destination()).unwrap();

        let src = ctx.create_buffer_source();
        src.set_buffer(AudioBuffer::from_mono(vec![1.0], 8000));
        src.connect(&conv).unwrap();
        src.start().unwrap();

        assert_eq!(ctx.render(3), vec![0.0, 0.5, 0.0]);
    }

    #[test]
    fn rejects_unusable_sample_rates() {
        for rate in [0.0, -44100.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                AudioContext::new(rate),
                Err(AudioError::InvalidSampleRate(_))
            ));
        }
    }

    #[test]
    fn convolver_is_released_once_its_source_ends_and_it_rings_out() {
        let ctx = AudioContext::new(8000.0).unwrap();
        let conv = ctx.create_convolver();
        conv.set_buffer(&AudioBuffer::from_mono(vec![0.5; 8], 8000));
        conv.connect(ctx.destination()).unwrap();

        let src = ctx.create_buffer_source();
        src.set_buffer(AudioBuffer::from_mono(vec![1.0; 4], 8000));
        src.connect(&conv).unwrap();
        src.start().unwrap();

        ctx.render(16);
        assert_eq!(ctx.active_sources(), 0);
        assert_eq!(ctx.node_count(), 1, "still ringing");

        ctx.render(512);
        assert_eq!(ctx.node_count(), 0);
        assert!(ctx.render(4).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn unfed_convolver_survives_until_connected() {
        let ctx = AudioContext::new(8000.0).unwrap();
        let conv = ctx.create_convolver();
        conv.set_buffer(&AudioBuffer::from_mono(vec![1.0], 8000));
        conv.connect(ctx.destination()).unwrap();
        ctx.render(1024);
        assert_eq!(ctx.node_count(), 1);

        let src = ctx.create_buffer_source();
        src.set_buffer(AudioBuffer::from_mono(vec![0.5], 8000));
        src.connect(&conv).unwrap();
        src.start().unwrap();
        assert_eq!(ctx.render(2), vec![0.5, 0.0]);
    }

    #[test]
    fn rejects_invalid_connections() {
        let ctx = AudioContext::new(8000.0).unwrap();
        let a = ctx.create_convolver();
        let b = ctx.create_convolver();
        assert!(matches!(
            a.connect(&b),
            Err(AudioError::InvalidConnection { .. })
        ));

        let osc = ctx.create_oscillator();
        let src = ctx.create_buffer_source();
        assert!(matches!(
            osc.connect(Destination::Node(src.id())),
            Err(AudioError::InvalidConnection { .. })
        ));
        assert!(matches!(
            osc.connect(Destination::Node(NodeId(999))),
            Err(AudioError::UnknownNode(_))
        ));
    }

    #[test]
    fn clones_share_the_graph() {
        let ctx = AudioContext::new(8000.0).unwrap();
        let other = ctx.clone();
        let osc = other.create_oscillator();
        osc.start().unwrap();
        assert!(ctx.same_context(&other));
        assert_eq!(ctx.active_sources(), 1);
        assert!(!ctx.same_context(&AudioContext::new(8000.0).unwrap()));
    }

    #[test]
    fn decodes_through_the_context() {
        let ctx = AudioContext::new(8000.0).unwrap();
        let bytes = crate::dsp::decode::tests::wav_bytes(1, 8000, &[0, 8192]);
        let buf = ctx.decode_audio_data(&bytes).unwrap();
        assert_eq!(buf.len(), 2);
        assert_eq!(ctx.decode_audio_data(b"nope"), Err(DecodeError::UnsupportedFormat));
    }
}
