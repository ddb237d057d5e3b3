//! Composition root: one audio context shared by the keyboard and the drums.

use crate::dom::{Container, Element, ElementList, Template};
use crate::drums::Drums;
use crate::dsp::context::AudioContext;
use crate::error::AudioError;
use crate::keyboard::{Keyboard, KeyboardConfig};

/// The `<template id="key-template">` content used when the host supplies none.
pub fn default_key_template() -> Template {
    Template::new(Element::new("button").with_class("keyboard__key"))
}

/// The `<template id="drum-loop-template">` content used when the host supplies none.
pub fn default_drum_template() -> Template {
    Template::new(Element::new("button").with_class("drums__button"))
}

pub struct Demos<K: Container = ElementList, D: Container = ElementList> {
    pub keyboard: Keyboard<K>,
    pub drums: Drums<D>,
}

impl<K: Container, D: Container> Demos<K, D> {
    /// Build both components against `context` and render them.
    pub fn new(
        context: &AudioContext,
        keyboard_container: K,
        key_template: Template,
        drums_container: D,
        drum_template: Template,
        config: KeyboardConfig,
    ) -> Result<Self, AudioError> {
        let mut keyboard = Keyboard::new(context.clone(), keyboard_container, key_template, config)?;
        let mut drums = Drums::new(context.clone(), drums_container, drum_template);
        keyboard.render();
        drums.render();
        keyboard.focus();
        Ok(Demos { keyboard, drums })
    }
}

impl Demos {
    /// Both components rendered into in-memory containers with the default templates.
    pub fn with_defaults(context: &AudioContext, config: KeyboardConfig) -> Result<Self, AudioError> {
        Self::new(
            context,
            ElementList::new(),
            default_key_template(),
            ElementList::new(),
            default_drum_template(),
            config,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::buffer::AudioBuffer;
    use crate::keyboard::InputEvent;

    #[test]
    fn components_share_one_context() {
        let ctx = AudioContext::new(8000.0).unwrap();
        let mut demos = Demos::with_defaults(&ctx, KeyboardConfig::default()).unwrap();
        demos.drums.set_buffer(AudioBuffer::from_mono(vec![0.1; 8], 8000));

        demos.keyboard.handle_event(&InputEvent::key_down("a")).unwrap();
        demos.drums.toggle().unwrap();

        assert!(demos.keyboard.context().same_context(&ctx));
        assert_eq!(ctx.active_sources(), 2);
    }

    #[test]
    fn renders_and_focuses_on_construction() {
        let ctx = AudioContext::new(8000.0).unwrap();
        let demos = Demos::with_defaults(&ctx, KeyboardConfig::default()).unwrap();
        assert_eq!(demos.keyboard.container().len(), 12);
        assert!(demos.keyboard.container().is_focused());
        assert_eq!(demos.drums.container().len(), 1);
    }
}
