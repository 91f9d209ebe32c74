use crate::{error::DecodeError, format::AudioFormatDescriptor};

pub mod memory;
pub mod wav;

/// Random-access decoder of a file's frames, always read in file order.
///
/// Frames are delivered as interleaved `f32` in `[-1.0, 1.0]`, one sample per
/// channel of [`FrameSource::native_format`].
pub trait FrameSource: Send {
    fn total_frames(&self) -> u64;

    fn native_format(&self) -> AudioFormatDescriptor;

    /// Decode up to `frame_count` frames starting at `start_frame` into
    /// `destination`.
    ///
    /// The count is clipped to the end of the file and to the room in
    /// `destination`; a short final read is not an error. On corrupt data the
    /// error carries how many leading frames of `destination` are still valid.
    fn fill(
        &mut self,
        start_frame: u64,
        frame_count: usize,
        destination: &mut [f32],
    ) -> Result<usize, DecodeError>;

    fn channels(&self) -> usize {
        usize::from(self.native_format().channels)
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn total_frames(&self) -> u64 {
        (**self).total_frames()
    }

    fn native_format(&self) -> AudioFormatDescriptor {
        (**self).native_format()
    }

    fn fill(
        &mut self,
        start_frame: u64,
        frame_count: usize,
        destination: &mut [f32],
    ) -> Result<usize, DecodeError> {
        (**self).fill(start_frame, frame_count, destination)
    }
}

/// Frames a fill may actually produce, given the file length and the room in
/// the destination.
pub(crate) fn clip_fill(
    total_frames: u64,
    channels: usize,
    start_frame: u64,
    frame_count: usize,
    destination_len: usize,
) -> usize {
    if channels == 0 || start_frame >= total_frames {
        return 0;
    }
    let remaining = usize::try_from(total_frames - start_frame).unwrap_or(usize::MAX);
    frame_count.min(remaining).min(destination_len / channels)
}
