use transport::FramePosition;

use crate::{
    constants::{DEFAULT_CHUNK_FRAMES, DEFAULT_LOOKAHEAD_DEPTH, DEFAULT_MAX_PULL_FRAMES},
    error::ReaderError,
    format::AudioFormatDescriptor,
};

/// Tuning for the reversal staging buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Frames decoded per forward read when staging reverse playback.
    pub chunk_frames: usize,
    /// Number of chunks kept around the cursor.
    pub lookahead_depth: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            chunk_frames: DEFAULT_CHUNK_FRAMES,
            lookahead_depth: DEFAULT_LOOKAHEAD_DEPTH,
        }
    }
}

impl ReaderConfig {
    pub fn validate(&self) -> Result<(), ReaderError> {
        if self.chunk_frames == 0 {
            return Err(ReaderError::Config("chunk_frames must be non-zero".to_owned()));
        }
        if self.lookahead_depth == 0 {
            return Err(ReaderError::Config(
                "lookahead_depth must be non-zero".to_owned(),
            ));
        }
        if FramePosition::try_from(self.chunk_frames.saturating_mul(self.lookahead_depth)).is_err()
        {
            return Err(ReaderError::Config("lookahead span overflows".to_owned()));
        }
        Ok(())
    }

    /// Frames kept staged around the cursor.
    pub fn retention_frames(&self) -> usize {
        self.chunk_frames * self.lookahead_depth
    }
}

/// How the output stage drives the hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Largest pull handed to the data source per block; also the size of
    /// the render scratch buffer allocated before the stream starts.
    pub max_pull_frames: usize,
    /// Fixed hardware buffer size to request, if any.
    pub hardware_buffer_frames: Option<u32>,
    /// Output device by name; the default device when unset.
    pub device_name: Option<String>,
}

impl OutputConfig {
    pub fn for_format(format: &AudioFormatDescriptor) -> Self {
        Self {
            sample_rate: format.sample_rate,
            channels: format.channels,
            max_pull_frames: DEFAULT_MAX_PULL_FRAMES,
            hardware_buffer_frames: None,
            device_name: None,
        }
    }
}
