pub mod app;
pub mod dom;
pub mod drums;
pub mod dsp;
pub mod error;
pub mod keyboard;
pub mod notes;
pub mod reverb;

use crate::app::Demos;
use crate::dsp::context::AudioContext;
use crate::keyboard::{InputEvent, KeyboardConfig, KeyboardState};
use crate::reverb::{ReverbBuffers, Routing};
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the synthkeys-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{e}"))
}

fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WASM-exposed: the keyboard and drums on one shared audio context.
///
/// The host materialises `renderKeys()` / `renderDrums()` as DOM nodes,
/// forwards input events, and pulls audio with `process()` from an
/// AudioWorklet running at the same sample rate.
#[wasm_bindgen(js_name = Demos)]
pub struct WasmDemos {
    context: AudioContext,
    demos: Demos,
}

#[wasm_bindgen(js_class = Demos)]
impl WasmDemos {
    /// `config` is an optional `{ octave, waveform }` object.
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: f64, config: JsValue) -> Result<WasmDemos, JsValue> {
        set_panic_hook();
        let config: KeyboardConfig = if config.is_undefined() || config.is_null() {
            KeyboardConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(js_error)?
        };
        let context = AudioContext::new(sample_rate).map_err(js_error)?;
        let demos = Demos::with_defaults(&context, config).map_err(js_error)?;
        Ok(WasmDemos { context, demos })
    }

    #[wasm_bindgen(js_name = renderKeys)]
    pub fn render_keys(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(self.demos.keyboard.container().children()).map_err(js_error)
    }

    #[wasm_bindgen(js_name = renderDrums)]
    pub fn render_drums(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(self.demos.drums.container().children()).map_err(js_error)
    }

    /// Returns whether a note is sounding afterwards.
    #[wasm_bindgen(js_name = keyDown)]
    pub fn key_down(&mut self, key: &str) -> Result<bool, JsValue> {
        self.dispatch(InputEvent::key_down(key))
    }

    #[wasm_bindgen(js_name = keyUp)]
    pub fn key_up(&mut self, key: &str) -> Result<bool, JsValue> {
        self.dispatch(InputEvent::key_up(key))
    }

    /// `frequency` is the clicked element's `data-frequency`, if any.
    #[wasm_bindgen(js_name = mouseDown)]
    pub fn mouse_down(&mut self, frequency: Option<String>) -> Result<bool, JsValue> {
        self.dispatch(InputEvent::MouseDown { frequency })
    }

    #[wasm_bindgen(js_name = mouseUp)]
    pub fn mouse_up(&mut self) -> Result<bool, JsValue> {
        self.dispatch(InputEvent::MouseUp)
    }

    #[wasm_bindgen(js_name = setOctave)]
    pub fn set_octave(&mut self, octave: u32) -> Result<(), JsValue> {
        self.demos.keyboard.set_octave(octave).map_err(js_error)
    }

    /// Decode an encoded drum loop (WAV, or MP3 when built with `mp3`).
    #[wasm_bindgen(js_name = loadDrumLoop)]
    pub fn load_drum_loop(&mut self, bytes: &[u8]) -> Result<(), JsValue> {
        let buffer = self.context.decode_audio_data(bytes).map_err(js_error)?;
        self.demos.drums.set_buffer(buffer);
        Ok(())
    }

    /// Returns whether the loop is playing afterwards.
    #[wasm_bindgen(js_name = toggleDrums)]
    pub fn toggle_drums(&mut self) -> Result<bool, JsValue> {
        let state = self.demos.drums.toggle().map_err(js_error)?;
        Ok(state == drums::DrumState::Playing)
    }

    /// Play the reverb demo from bytes the host already downloaded.
    /// `routing` is `"dry"` or `"convolved"`; anything else is rejected.
    #[wasm_bindgen(js_name = playReverb)]
    pub fn play_reverb(&mut self, piano: &[u8], impulse_response: &[u8], routing: &str) -> Result<(), JsValue> {
        let routing: Routing = routing.parse().map_err(js_error)?;
        let buffers = ReverbBuffers {
            piano: self.context.decode_audio_data(piano).map_err(js_error)?,
            impulse_response: self.context.decode_audio_data(impulse_response).map_err(js_error)?,
        };
        reverb::play(&self.context, &buffers, routing).map_err(js_error)?;
        Ok(())
    }

    /// Render the next `frames` mono samples.
    pub fn process(&mut self, frames: usize) -> Vec<f32> {
        self.context.render(frames)
    }

    #[wasm_bindgen(js_name = isSounding)]
    pub fn is_sounding(&self) -> bool {
        self.demos.keyboard.state() != KeyboardState::Idle
    }
}

impl WasmDemos {
    fn dispatch(&mut self, event: InputEvent) -> Result<bool, JsValue> {
        let state = self.demos.keyboard.handle_event(&event).map_err(js_error)?;
        Ok(state != KeyboardState::Idle)
    }
}
