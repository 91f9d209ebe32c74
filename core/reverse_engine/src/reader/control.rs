use std::{sync::Arc, time::Instant};

use log::{debug, info};
use transport::{Direction, FramePosition, PlaybackWindow, SharedTransport};

use crate::format::AudioFormatDescriptor;

/// Control-thread handle to a [`super::Reader`].
///
/// Every request is posted through the shared atomic block and takes effect
/// at the start of the reader's next pull, never in the middle of one.
#[derive(Debug)]
pub struct ReaderControl {
    shared: Arc<SharedTransport>,
    window: PlaybackWindow,
    total_frames: u64,
    file_format: AudioFormatDescriptor,
    client_format: AudioFormatDescriptor,
}

impl ReaderControl {
    pub(crate) fn new(
        shared: Arc<SharedTransport>,
        window: PlaybackWindow,
        total_frames: u64,
        file_format: AudioFormatDescriptor,
        client_format: AudioFormatDescriptor,
    ) -> Self {
        Self {
            shared,
            window,
            total_frames,
            file_format,
            client_format,
        }
    }

    /// Move playback to `frame`, clamped to the window. Returns the frame
    /// actually requested.
    pub fn seek(&self, frame: FramePosition) -> FramePosition {
        let target = self.window.clamp(frame);
        self.shared.request_seek(target);
        debug!("seek to frame {target} (asked {frame})");
        target
    }

    /// Seek to a fraction of the whole file, as a scrubber would.
    pub fn seek_fraction(&self, fraction: f64) -> FramePosition {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.seek((self.total_frames as f64 * fraction) as FramePosition)
    }

    /// Change playback direction in place; no implicit seek.
    pub fn set_direction(&self, direction: Direction) {
        if self.shared.direction() != direction {
            info!("playback direction -> {direction:?}");
        }
        self.shared.request_direction(direction);
    }

    pub fn direction(&self) -> Direction {
        self.shared.direction()
    }

    /// Narrow playback to `[start, end)`, clamped to the file.
    pub fn set_window(&mut self, start: FramePosition, end: FramePosition) -> PlaybackWindow {
        self.window = PlaybackWindow::clamped(start, end, self.total_frames);
        self.shared.publish_window(self.window);
        info!(
            "playback window -> [{}, {})",
            self.window.start(),
            self.window.end()
        );
        self.window
    }

    pub fn reset_window(&mut self) -> PlaybackWindow {
        self.set_window(0, FramePosition::MAX)
    }

    pub fn window(&self) -> PlaybackWindow {
        self.window
    }

    /// Last position published by the reader (or the latest seek target).
    pub fn position(&self) -> FramePosition {
        self.shared.position()
    }

    /// `true` when the last pull left the cursor on the window edge it is
    /// heading towards. Stopping, looping or flipping is up to the caller.
    pub fn at_boundary(&self) -> bool {
        self.shared.at_boundary()
    }

    pub fn is_reading(&self) -> bool {
        self.shared.is_reading()
    }

    pub fn seek_generation(&self) -> u64 {
        self.shared.seek_generation()
    }

    pub fn last_seek_time(&self) -> Option<Instant> {
        self.shared.last_seek_time()
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn file_format(&self) -> AudioFormatDescriptor {
        self.file_format
    }

    pub fn client_format(&self) -> AudioFormatDescriptor {
        self.client_format
    }
}
