use crate::{
    error::{DecodeError, OpenError},
    format::AudioFormatDescriptor,
    source::{FrameSource, clip_fill},
};

/// Fully decoded frames held in memory.
#[derive(Debug, Clone)]
pub struct MemoryFrameSource {
    /// Interleaved samples, `channels` per frame
    samples: Vec<f32>,
    format: AudioFormatDescriptor,
}

impl MemoryFrameSource {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self, OpenError> {
        Self::with_format(
            samples,
            AudioFormatDescriptor::float32_interleaved(sample_rate, channels),
        )
    }

    /// Wrap samples already decoded from a file whose native layout was
    /// `format`.
    pub fn with_format(samples: Vec<f32>, format: AudioFormatDescriptor) -> Result<Self, OpenError> {
        let channels = usize::from(format.channels);
        if channels == 0 {
            return Err(OpenError::Unsupported("zero channels".to_owned()));
        }
        if samples.len() % channels != 0 {
            return Err(OpenError::Unsupported(format!(
                "{} samples do not divide into {channels}-channel frames",
                samples.len()
            )));
        }
        if samples.is_empty() {
            return Err(OpenError::Empty);
        }
        Ok(Self { samples, format })
    }

    /// Samples already validated against `format` by the decoder.
    pub(crate) fn from_decoded(samples: Vec<f32>, format: AudioFormatDescriptor) -> Self {
        Self { samples, format }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

impl FrameSource for MemoryFrameSource {
    fn total_frames(&self) -> u64 {
        (self.samples.len() / usize::from(self.format.channels)) as u64
    }

    fn native_format(&self) -> AudioFormatDescriptor {
        self.format
    }

    fn fill(
        &mut self,
        start_frame: u64,
        frame_count: usize,
        destination: &mut [f32],
    ) -> Result<usize, DecodeError> {
        let channels = usize::from(self.format.channels);
        let frames = clip_fill(
            self.total_frames(),
            channels,
            start_frame,
            frame_count,
            destination.len(),
        );
        if frames == 0 {
            return Ok(0);
        }
        let offset = start_frame as usize * channels;
        let len = frames * channels;
        destination[..len].copy_from_slice(&self.samples[offset..offset + len]);
        Ok(frames)
    }
}
