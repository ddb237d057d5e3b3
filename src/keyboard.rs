//! Keyboard: a monophonic synth played with the mouse or the computer keyboard.
//!
//! Input events are resolved to commands (`Play`, `Stop`, `Ignore`) and drive
//! a single oscillator through `Idle` / `Sounding`. Pressing a new note stops
//! the previous oscillator first; releasing while idle does nothing.

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::dom::{Container, ElementList, Template};
use crate::dsp::context::{AudioContext, AudioNode, OscillatorNode, ScheduledSourceNode};
use crate::dsp::oscillator::Waveform;
use crate::error::AudioError;
use crate::notes::{self, Resolution, NOTES};

/// Class added to the rendered keys of sharp notes.
pub const SHARP_MODIFIER: &str = "keyboard__key--sharp";
pub const DEFAULT_OCTAVE: u32 = 4;

// ── Configuration ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    /// Multiplier applied to the octave-0 note frequencies.
    pub octave: u32,
    pub waveform: Waveform,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        KeyboardConfig {
            octave: DEFAULT_OCTAVE,
            waveform: Waveform::Square,
        }
    }
}

// ── Events ──────────────────────────────────────────────────

/// Input delivered to the keyboard's container.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// `key` as reported by `KeyboardEvent.key`.
    KeyDown { key: String },
    KeyUp { key: String },
    /// `frequency` is the target element's `data-frequency`, if it has one.
    MouseDown { frequency: Option<String> },
    MouseUp,
}

impl InputEvent {
    pub fn key_down(key: impl Into<String>) -> Self {
        InputEvent::KeyDown { key: key.into() }
    }

    pub fn key_up(key: impl Into<String>) -> Self {
        InputEvent::KeyUp { key: key.into() }
    }

    pub fn mouse_down(frequency: Option<&str>) -> Self {
        InputEvent::MouseDown {
            frequency: frequency.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Play an octave-0 base frequency.
    Play(f64),
    Stop,
    Ignore,
}

/// Releases stop whatever is sounding regardless of which key or button
/// was released.
pub fn resolve_event(event: &InputEvent) -> Command {
    let resolution = match event {
        InputEvent::KeyDown { key } => notes::resolve_key(key),
        InputEvent::MouseDown { frequency } => notes::resolve_dataset(frequency.as_deref()),
        InputEvent::KeyUp { .. } | InputEvent::MouseUp => return Command::Stop,
    };
    match resolution {
        Resolution::Bound(f) => Command::Play(f),
        Resolution::Unbound => Command::Ignore,
    }
}

// ── Keyboard ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyboardState {
    Idle,
    /// `frequency` is the played frequency, octave applied.
    Sounding { frequency: f64 },
}

#[derive(Debug)]
struct Voice {
    oscillator: OscillatorNode,
    frequency: f64,
}

#[derive(Debug)]
pub struct Keyboard<C: Container = ElementList> {
    context: AudioContext,
    container: C,
    key_template: Template,
    octave: u32,
    waveform: Waveform,
    voice: Option<Voice>,
    rendered: bool,
}

impl<C: Container> Keyboard<C> {
    pub fn new(
        context: AudioContext,
        container: C,
        key_template: Template,
        config: KeyboardConfig,
    ) -> Result<Self, AudioError> {
        validate_octave(config.octave)?;
        Ok(Keyboard {
            context,
            container,
            key_template,
            octave: config.octave,
            waveform: config.waveform,
            voice: None,
            rendered: false,
        })
    }

    /// Append one key per note, in table order. Only the first call renders.
    pub fn render(&mut self) {
        if self.rendered {
            return;
        }
        for note in NOTES {
            let mut key = self.key_template.instantiate();
            key.text_content = note.name.to_string();
            if notes::is_sharp(note.name) {
                key.add_class(SHARP_MODIFIER);
            }
            key.set_data("frequency", note.base_frequency);
            self.container.append_child(key);
        }
        self.rendered = true;
        debug!("rendered {} keys", NOTES.len());
    }

    pub fn handle_event(&mut self, event: &InputEvent) -> Result<KeyboardState, AudioError> {
        match resolve_event(event) {
            Command::Play(base_frequency) => self.play(base_frequency)?,
            Command::Stop => {
                self.stop();
            }
            Command::Ignore => trace!("ignoring {event:?}"),
        }
        Ok(self.state())
    }

    /// Start a square-wave (by default) oscillator at `base_frequency × octave`,
    /// stopping any oscillator already sounding.
    pub fn play(&mut self, base_frequency: f64) -> Result<(), AudioError> {
        if let Some(previous) = self.voice.take() {
            previous.oscillator.stop()?;
        }

        let frequency = base_frequency * self.octave as f64;
        let oscillator = self.context.create_oscillator();
        oscillator.set_frequency(frequency);
        oscillator.set_type(self.waveform);
        oscillator.connect(self.context.destination())?;
        oscillator.start()?;
        debug!("playing {frequency:.2} Hz ({})", self.waveform.as_str());

        self.voice = Some(Voice {
            oscillator,
            frequency,
        });
        Ok(())
    }

    /// Stop the sounding oscillator. Returns whether anything was stopped.
    pub fn stop(&mut self) -> bool {
        let Some(voice) = self.voice.take() else {
            trace!("stop while idle");
            return false;
        };
        // The tracked oscillator was started by `play`, so this cannot fail.
        if let Err(e) = voice.oscillator.stop() {
            log::warn!("failed to stop oscillator: {e}");
        }
        true
    }

    pub fn state(&self) -> KeyboardState {
        match &self.voice {
            Some(v) => KeyboardState::Sounding {
                frequency: v.frequency,
            },
            None => KeyboardState::Idle,
        }
    }

    pub fn octave(&self) -> u32 {
        self.octave
    }

    /// Applies to the next note; a sounding note keeps its pitch.
    pub fn set_octave(&mut self, octave: u32) -> Result<(), AudioError> {
        validate_octave(octave)?;
        self.octave = octave;
        Ok(())
    }

    pub fn focus(&mut self) {
        self.container.focus();
    }

    pub fn container(&self) -> &C {
        &self.container
    }

    pub fn context(&self) -> &AudioContext {
        &self.context
    }
}

fn validate_octave(octave: u32) -> Result<(), AudioError> {
    if octave == 0 {
        return Err(AudioError::InvalidOctave(octave));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Element;
    use crate::notes::KEY_BINDINGS;

    fn keyboard() -> Keyboard {
        let ctx = AudioContext::new(8000.0).unwrap();
        let template = Template::new(Element::new("button").with_class("keyboard__key"));
        Keyboard::new(ctx, ElementList::new(), template, KeyboardConfig::default()).unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn every_bound_key_plays_table_frequency_times_octave() {
        for binding in KEY_BINDINGS {
            let mut kb = keyboard();
            let key = binding.input_key.to_string();
            let state = kb.handle_event(&InputEvent::key_down(&key)).unwrap();
            let expected = notes::note_frequency(binding.note_name).unwrap() * 4.0;
            match state {
                KeyboardState::Sounding { frequency } => {
                    assert!(approx(frequency, expected), "key {key}: {frequency} != {expected}")
                }
                KeyboardState::Idle => panic!("key {key} did not sound"),
            }
            assert_eq!(kb.context().active_sources(), 1);
        }
    }

    #[test]
    fn oscillator_is_square_at_scaled_frequency() {
        let mut kb = keyboard();
        kb.handle_event(&InputEvent::key_down("k")).unwrap();
        let voice = kb.voice.as_ref().unwrap();
        assert_eq!(voice.oscillator.waveform(), Some(Waveform::Square));
        assert!(approx(voice.oscillator.frequency().unwrap(), 110.0));
    }

    #[test]
    fn unbound_key_leaves_idle_state_unchanged() {
        let mut kb = keyboard();
        assert_eq!(
            kb.handle_event(&InputEvent::key_down("q")).unwrap(),
            KeyboardState::Idle
        );
        assert_eq!(kb.context().active_sources(), 0);
    }

    #[test]
    fn unbound_key_leaves_sounding_state_unchanged() {
        let mut kb = keyboard();
        let sounding = kb.handle_event(&InputEvent::key_down("a")).unwrap();
        let after = kb.handle_event(&InputEvent::key_down("Enter")).unwrap();
        assert_eq!(sounding, after);
        assert_eq!(kb.context().active_sources(), 1);
    }

    #[test]
    fn release_stops_exactly_once() {
        let mut kb = keyboard();
        kb.handle_event(&InputEvent::key_down("a")).unwrap();
        // release of a different key still stops
        assert_eq!(
            kb.handle_event(&InputEvent::key_up("z")).unwrap(),
            KeyboardState::Idle
        );
        assert_eq!(kb.context().active_sources(), 0);
        assert!(!kb.stop());
    }

    #[test]
    fn release_while_idle_is_not_an_error() {
        let mut kb = keyboard();
        assert_eq!(kb.handle_event(&InputEvent::MouseUp).unwrap(), KeyboardState::Idle);
        assert_eq!(
            kb.handle_event(&InputEvent::key_up("a")).unwrap(),
            KeyboardState::Idle
        );
    }

    #[test]
    fn second_press_replaces_previous_oscillator() {
        let mut kb = keyboard();
        kb.handle_event(&InputEvent::key_down("a")).unwrap();
        kb.handle_event(&InputEvent::key_down("l")).unwrap();
        assert_eq!(kb.context().active_sources(), 1);
        assert_eq!(
            kb.state(),
            KeyboardState::Sounding {
                frequency: 30.87 * 4.0
            }
        );
        kb.handle_event(&InputEvent::key_up("l")).unwrap();
        assert_eq!(kb.context().active_sources(), 0);
    }

    #[test]
    fn renders_twelve_keys_in_table_order() {
        let mut kb = keyboard();
        kb.render();
        let keys = kb.container().children();
        assert_eq!(keys.len(), 12);
        for (key, note) in keys.iter().zip(NOTES) {
            assert_eq!(key.text_content, note.name);
            assert_eq!(key.has_class(SHARP_MODIFIER), note.name.contains('#'));
            assert!(key.has_class("keyboard__key"));
            assert_eq!(key.data("frequency"), Some(note.base_frequency.to_string().as_str()));
        }
    }

    #[test]
    fn render_happens_once() {
        let mut kb = keyboard();
        kb.render();
        kb.render();
        assert_eq!(kb.container().len(), 12);
    }

    #[test]
    fn clicking_a_rendered_key_plays_its_data_frequency() {
        let mut kb = keyboard();
        kb.render();
        let sharp = kb.container().children()[6].clone();
        assert_eq!(sharp.text_content, "F#");

        let state = kb
            .handle_event(&InputEvent::mouse_down(sharp.data("frequency")))
            .unwrap();
        assert_eq!(state, KeyboardState::Sounding { frequency: 23.12 * 4.0 });
    }

    #[test]
    fn click_path_ignores_the_binding_table() {
        let mut kb = keyboard();
        let state = kb.handle_event(&InputEvent::mouse_down(Some("100"))).unwrap();
        assert_eq!(state, KeyboardState::Sounding { frequency: 400.0 });
    }

    #[test]
    fn click_outside_a_key_is_ignored() {
        let mut kb = keyboard();
        assert_eq!(
            kb.handle_event(&InputEvent::mouse_down(None)).unwrap(),
            KeyboardState::Idle
        );
    }

    #[test]
    fn octave_scales_the_next_note() {
        let mut kb = keyboard();
        kb.set_octave(2).unwrap();
        assert_eq!(
            kb.handle_event(&InputEvent::key_down("a")).unwrap(),
            KeyboardState::Sounding { frequency: 32.7 }
        );
        assert_eq!(kb.set_octave(0), Err(AudioError::InvalidOctave(0)));
        assert_eq!(kb.octave(), 2);
    }

    #[test]
    fn rejects_zero_octave_config() {
        let config = KeyboardConfig {
            octave: 0,
            ..KeyboardConfig::default()
        };
        let result = Keyboard::new(
            AudioContext::new(8000.0).unwrap(),
            ElementList::new(),
            Template::new(Element::new("div")),
            config,
        );
        assert!(matches!(result, Err(AudioError::InvalidOctave(0))));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: KeyboardConfig = serde_json::from_str(r#"{"waveform":"sine"}"#).unwrap();
        assert_eq!(config.octave, DEFAULT_OCTAVE);
        assert_eq!(config.waveform, Waveform::Sine);
    }

    #[test]
    fn focus_reaches_the_container() {
        let mut kb = keyboard();
        kb.focus();
        assert!(kb.container().is_focused());
    }

    #[test]
    fn resolves_events_to_commands() {
        assert_eq!(resolve_event(&InputEvent::key_down("a")), Command::Play(16.35));
        assert_eq!(resolve_event(&InputEvent::key_down("x")), Command::Ignore);
        assert_eq!(resolve_event(&InputEvent::key_up("x")), Command::Stop);
        assert_eq!(resolve_event(&InputEvent::MouseUp), Command::Stop);
    }
}
