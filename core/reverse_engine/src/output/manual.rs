use std::sync::{Arc, Mutex, PoisonError};

use super::{AudioBackend, Renderer};
use crate::{config::OutputConfig, error::AudioDeviceError};

#[derive(Debug, Default)]
struct ManualStream {
    renderer: Option<Renderer>,
    channels: usize,
}

/// Backend without hardware: the caller drives ticks by hand.
///
/// Clones share the same stream, so one clone can be handed to an
/// [`super::Output`] while another ticks it from a test or an offline
/// render loop on any thread.
#[derive(Debug, Clone, Default)]
pub struct ManualBackend {
    stream: Arc<Mutex<ManualStream>>,
}

impl ManualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.lock().renderer.is_some()
    }

    /// Device channels of the open stream, zero when closed.
    pub fn channels(&self) -> usize {
        self.lock().channels
    }

    /// Run one tick into `data`. Returns `false` without touching `data`
    /// when no stream is open.
    pub fn tick_into(&self, data: &mut [f32]) -> bool {
        let mut stream = self.lock();
        let channels = stream.channels;
        match stream.renderer.as_mut() {
            Some(renderer) => {
                renderer.render(data, channels);
                true
            }
            None => false,
        }
    }

    /// Run one tick of `frames` frames into a fresh buffer, or `None` when no
    /// stream is open.
    pub fn tick(&self, frames: usize) -> Option<Vec<f32>> {
        let mut data = vec![0.0; frames * self.channels().max(1)];
        self.tick_into(&mut data).then_some(data)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualStream> {
        self.stream.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AudioBackend for ManualBackend {
    fn open_stream(
        &mut self,
        renderer: Renderer,
        config: &OutputConfig,
    ) -> Result<(), AudioDeviceError> {
        let mut stream = self.lock();
        stream.channels = usize::from(config.channels).max(1);
        stream.renderer = Some(renderer);
        Ok(())
    }

    fn close_stream(&mut self) {
        let mut stream = self.lock();
        stream.renderer = None;
        stream.channels = 0;
    }
}
