use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use cpal::{FromSample, Sample};

use super::{OutputShared, OutputState};

/// Render-thread half of an [`super::Output`].
///
/// Backends call [`Renderer::render`] from their hardware callback. All
/// memory it touches is allocated when the output starts.
pub struct Renderer {
    shared: Arc<OutputShared>,
    channels: usize,
    max_pull_frames: usize,
    scratch: Vec<f32>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("channels", &self.channels)
            .field("max_pull_frames", &self.max_pull_frames)
            .finish_non_exhaustive()
    }
}

/// Marks one tick as in flight for as long as it lives.
struct TickGuard<'a>(&'a AtomicU32);

impl<'a> TickGuard<'a> {
    fn enter(in_flight: &'a AtomicU32) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self(in_flight)
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Renderer {
    pub(crate) fn new(shared: Arc<OutputShared>, channels: usize, max_pull_frames: usize) -> Self {
        let channels = channels.max(1);
        let max_pull_frames = max_pull_frames.max(1);
        Self {
            shared,
            channels,
            max_pull_frames,
            scratch: vec![0.0; channels * max_pull_frames],
        }
    }

    /// Channels the data source delivers.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Fill one hardware buffer of `device_channels`-interleaved samples.
    ///
    /// Whatever the data source does not provide is written as silence: a
    /// short read, a source busy being swapped, or an output that is not
    /// running.
    pub fn render<T>(&mut self, data: &mut [T], device_channels: usize)
    where
        T: Sample + FromSample<f32>,
    {
        let shared = &*self.shared;
        let _tick = TickGuard::enter(&shared.in_flight);

        let device_channels = device_channels.max(1);
        let frames = data.len() / device_channels;
        if shared.state() != OutputState::Running {
            data.fill(T::EQUILIBRIUM);
            return;
        }
        let Ok(mut slot) = shared.source.try_lock() else {
            data.fill(T::EQUILIBRIUM);
            shared
                .silenced_frames
                .fetch_add(frames as u64, Ordering::Relaxed);
            return;
        };
        let Some(source) = slot.as_mut() else {
            data.fill(T::EQUILIBRIUM);
            return;
        };
        shared.ticks.fetch_add(1, Ordering::Relaxed);
        source.begin_tick();

        let mut done = 0;
        while done < frames {
            let block = (frames - done).min(self.max_pull_frames);
            let scratch = &mut self.scratch[..block * self.channels];
            let filled = source.read_frames(block, scratch).min(block);
            scratch[filled * self.channels..].fill(0.0);

            let out = &mut data[done * device_channels..(done + block) * device_channels];
            map_channels(scratch, self.channels, out, device_channels);
            done += block;

            if filled < block {
                let rest = frames - done;
                data[done * device_channels..].fill(T::EQUILIBRIUM);
                shared
                    .silenced_frames
                    .fetch_add((block - filled + rest) as u64, Ordering::Relaxed);
                return;
            }
        }
        data[frames * device_channels..].fill(T::EQUILIBRIUM);
    }
}

/// Copy interleaved frames from `input` into `output`. Mono is spread to
/// every output channel; otherwise channels map one to one and extra output
/// channels stay silent.
fn map_channels<T>(input: &[f32], in_channels: usize, output: &mut [T], out_channels: usize)
where
    T: Sample + FromSample<f32>,
{
    for (frame, out) in input
        .chunks_exact(in_channels)
        .zip(output.chunks_exact_mut(out_channels))
    {
        if in_channels == 1 {
            out.fill(T::from_sample(frame[0]));
            continue;
        }
        for (c, sample) in out.iter_mut().enumerate() {
            *sample = frame.get(c).map_or(T::EQUILIBRIUM, |&s| T::from_sample(s));
        }
    }
}
