//! Drums: a looping drum sample toggled on and off by clicking its element.

use log::debug;

use crate::dom::{Container, ElementList, Template};
use crate::dsp::buffer::AudioBuffer;
use crate::dsp::context::{AudioContext, AudioNode, BufferSourceNode, ScheduledSourceNode};
use crate::error::AudioError;
use crate::keyboard::InputEvent;

pub const LOOP_CLASS: &str = "drums__loop";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrumState {
    Stopped,
    Playing,
}

#[derive(Debug)]
pub struct Drums<C: Container = ElementList> {
    context: AudioContext,
    container: C,
    template: Template,
    buffer: Option<AudioBuffer>,
    source: Option<BufferSourceNode>,
    rendered: bool,
}

impl<C: Container> Drums<C> {
    pub fn new(context: AudioContext, container: C, template: Template) -> Self {
        Drums {
            context,
            container,
            template,
            buffer: None,
            source: None,
            rendered: false,
        }
    }

    pub fn render(&mut self) {
        if self.rendered {
            return;
        }
        let mut element = self.template.instantiate();
        element.text_content = "Drums".to_string();
        element.add_class(LOOP_CLASS);
        self.container.append_child(element);
        self.rendered = true;
    }

    /// Supply the decoded loop. Takes effect the next time the loop starts.
    pub fn set_buffer(&mut self, buffer: AudioBuffer) {
        self.buffer = Some(buffer);
    }

    pub fn has_buffer(&self) -> bool {
        self.buffer.is_some()
    }

    /// Mouse-down toggles the loop; other input is ignored.
    pub fn handle_event(&mut self, event: &InputEvent) -> Result<DrumState, AudioError> {
        match event {
            InputEvent::MouseDown { .. } => self.toggle(),
            _ => Ok(self.state()),
        }
    }

    pub fn toggle(&mut self) -> Result<DrumState, AudioError> {
        if let Some(source) = self.source.take() {
            source.stop()?;
            debug!("drum loop stopped");
            return Ok(DrumState::Stopped);
        }

        let buffer = self.buffer.clone().ok_or(AudioError::MissingBuffer)?;
        let source = self.context.create_buffer_source();
        source.set_buffer(buffer);
        source.set_loop(true);
        source.connect(self.context.destination())?;
        source.start()?;
        debug!("drum loop started");
        self.source = Some(source);
        Ok(DrumState::Playing)
    }

    pub fn state(&self) -> DrumState {
        match self.source {
            Some(_) => DrumState::Playing,
            None => DrumState::Stopped,
        }
    }

    pub fn container(&self) -> &C {
        &self.container
    }
}
