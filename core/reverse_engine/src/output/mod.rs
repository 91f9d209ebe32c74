use std::{
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use log::{debug, error, info};

use crate::{config::OutputConfig, error::AudioDeviceError};

pub mod cpal_backend;
pub mod manual;
pub mod renderer;

pub use cpal_backend::CpalBackend;
pub use manual::ManualBackend;
pub use renderer::Renderer;

/// Anything that can fill an interleaved `f32` buffer on demand.
///
/// This is the whole contract between the output stage and whatever feeds
/// it. Implementations run on the render thread: no blocking, no allocation.
pub trait OutputDataSource: Send {
    /// Called once at the start of every hardware tick, before the first
    /// [`OutputDataSource::read_frames`] of that tick. A tick larger than the
    /// output's pull size is served by several reads; anything the source
    /// latches here stays fixed across all of them.
    fn begin_tick(&mut self) {}

    /// Write up to `frames` frames into `destination` and return how many
    /// were written. A short count means the source has nothing more to give
    /// for now; the output silences the rest.
    fn read_frames(&mut self, frames: usize, destination: &mut [f32]) -> usize;
}

impl<T: OutputDataSource + ?Sized> OutputDataSource for Box<T> {
    fn begin_tick(&mut self) {
        (**self).begin_tick();
    }

    fn read_frames(&mut self, frames: usize, destination: &mut [f32]) -> usize {
        (**self).read_frames(frames, destination)
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl OutputState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// A platform stream that calls [`Renderer::render`] on every hardware tick.
pub trait AudioBackend {
    /// Build and start a stream driven by `renderer`.
    fn open_stream(
        &mut self,
        renderer: Renderer,
        config: &OutputConfig,
    ) -> Result<(), AudioDeviceError>;

    /// Stop the stream and drop its renderer. Must be a no-op when no stream
    /// is open.
    fn close_stream(&mut self);
}

type SourceSlot = Mutex<Option<Box<dyn OutputDataSource>>>;

/// State shared between [`Output`] and its [`Renderer`].
pub(crate) struct OutputShared {
    state: AtomicU8,
    /// Ticks currently inside [`Renderer::render`].
    pub(crate) in_flight: AtomicU32,
    pub(crate) source: SourceSlot,
    /// Mirrors `source.is_some()` so the control side never contends for the
    /// lock the renderer uses.
    has_source: AtomicBool,
    pub(crate) silenced_frames: AtomicU64,
    pub(crate) ticks: AtomicU64,
}

impl OutputShared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(OutputState::Stopped as u8),
            in_flight: AtomicU32::new(0),
            source: Mutex::new(None),
            has_source: AtomicBool::new(false),
            silenced_frames: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
        }
    }

    pub(crate) fn state(&self) -> OutputState {
        OutputState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: OutputState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn lock_source(&self) -> MutexGuard<'_, Option<Box<dyn OutputDataSource>>> {
        self.source.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until no tick is inside the renderer.
    ///
    /// Pairs with the increment-then-check in [`Renderer::render`]: once the
    /// state is no longer `Running`, any tick that starts afterwards sees it
    /// and leaves the data source alone.
    fn wait_for_idle(&self) {
        let mut spins = 0u32;
        while self.in_flight.load(Ordering::SeqCst) != 0 {
            if spins < 64 {
                std::hint::spin_loop();
                spins += 1;
            } else {
                thread::sleep(Duration::from_micros(100));
            }
        }
    }
}

/// The real-time output unit.
///
/// Pulls a fixed number of frames from the registered data source on every
/// hardware tick and hands them to the backend's stream. Owns the
/// `Stopped -> Starting -> Running -> Stopping -> Stopped` lifecycle.
pub struct Output<B: AudioBackend> {
    backend: B,
    config: OutputConfig,
    shared: Arc<OutputShared>,
}

impl<B: AudioBackend> Output<B> {
    pub fn new(backend: B, config: OutputConfig) -> Self {
        Self {
            backend,
            config,
            shared: Arc::new(OutputShared::new()),
        }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn state(&self) -> OutputState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == OutputState::Running
    }

    /// Register the data source, returning the one it replaces.
    ///
    /// Only allowed while stopped.
    pub fn set_data_source(
        &mut self,
        source: Box<dyn OutputDataSource>,
    ) -> Result<Option<Box<dyn OutputDataSource>>, AudioDeviceError> {
        self.ensure_stopped()?;
        let previous = self.shared.lock_source().replace(source);
        self.shared.has_source.store(true, Ordering::Release);
        Ok(previous)
    }

    pub fn take_data_source(
        &mut self,
    ) -> Result<Option<Box<dyn OutputDataSource>>, AudioDeviceError> {
        self.ensure_stopped()?;
        let previous = self.shared.lock_source().take();
        self.shared.has_source.store(false, Ordering::Release);
        Ok(previous)
    }

    /// Never touches the source lock, so it is safe to poll while running.
    pub fn has_data_source(&self) -> bool {
        self.shared.has_source.load(Ordering::Acquire)
    }

    /// Start pulling from the data source.
    ///
    /// Starting a running output is a no-op. On failure the output is left
    /// `Stopped`.
    pub fn start_output_unit(&mut self) -> Result<(), AudioDeviceError> {
        match self.state() {
            OutputState::Running => return Ok(()),
            OutputState::Stopped => {}
            other => return Err(AudioDeviceError::InvalidState(other)),
        }
        if !self.has_data_source() {
            return Err(AudioDeviceError::NoDataSource);
        }

        self.shared.set_state(OutputState::Starting);
        let renderer = Renderer::new(
            Arc::clone(&self.shared),
            usize::from(self.config.channels),
            self.config.max_pull_frames,
        );
        if let Err(e) = self.backend.open_stream(renderer, &self.config) {
            error!("output failed to start: {e}");
            self.shared.set_state(OutputState::Stopped);
            return Err(e);
        }

        self.shared.set_state(OutputState::Running);
        info!(
            "output running: {} Hz, {} ch, pulls of up to {} frames",
            self.config.sample_rate, self.config.channels, self.config.max_pull_frames
        );
        Ok(())
    }

    /// Stop pulling. Safe to call in any state, any number of times.
    ///
    /// Returns once the tick in progress (if any) has finished; the data
    /// source is not called again after this returns.
    pub fn stop_output_unit(&mut self) {
        if self.state() == OutputState::Stopped {
            return;
        }
        self.shared.set_state(OutputState::Stopping);
        self.shared.wait_for_idle();
        self.backend.close_stream();
        self.shared.set_state(OutputState::Stopped);
        info!(
            "output stopped after {} ticks, {} frames silenced",
            self.ticks(),
            self.silenced_frames()
        );
    }

    /// Play/pause. Returns the state after the call.
    pub fn toggle(&mut self) -> Result<OutputState, AudioDeviceError> {
        if self.is_running() {
            self.stop_output_unit();
        } else {
            self.start_output_unit()?;
        }
        Ok(self.state())
    }

    /// Frames written as silence because the source came up short or was
    /// busy.
    pub fn silenced_frames(&self) -> u64 {
        self.shared.silenced_frames.load(Ordering::Relaxed)
    }

    /// Ticks that reached the data source.
    pub fn ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::Relaxed)
    }

    fn ensure_stopped(&self) -> Result<(), AudioDeviceError> {
        match self.state() {
            OutputState::Stopped => Ok(()),
            other => {
                debug!("data source change refused while {other:?}");
                Err(AudioDeviceError::InvalidState(other))
            }
        }
    }
}

impl<B: AudioBackend + fmt::Debug> fmt::Debug for Output<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("backend", &self.backend)
            .field("config", &self.config)
            .field("state", &self.state())
            .field("has_data_source", &self.has_data_source())
            .finish_non_exhaustive()
    }
}

impl<B: AudioBackend> Drop for Output<B> {
    fn drop(&mut self) {
        self.stop_output_unit();
    }
}
