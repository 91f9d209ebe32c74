use std::{
    sync::atomic::{AtomicBool, AtomicI64, AtomicU8, AtomicU64, Ordering, fence},
    time::{Duration, Instant},
};

use crate::{
    direction::Direction,
    window::{FramePosition, PlaybackWindow},
};

const NO_SEEK: FramePosition = FramePosition::MIN;

/// Lock-free handoff between one control thread and one render thread.
///
/// The control thread posts seeks, direction and window changes; the render
/// thread picks them up at the start of a pull and publishes the position it
/// reached at the end of it. Nothing in here blocks either side.
///
/// Seeks go through a single-slot mailbox: a burst of seeks between two pulls
/// coalesces into the latest one, and a pull applies it whole or not at all.
/// Window changes use a sequence counter (odd while a write is in progress)
/// so the render thread never applies a torn `[start, end)` pair.
#[derive(Debug)]
pub struct SharedTransport {
    epoch: Instant,
    position: AtomicI64,
    direction: AtomicU8,
    at_boundary: AtomicBool,
    is_reading: AtomicBool,
    seek_mailbox: AtomicI64,
    seek_generation: AtomicU64,
    /// Nanoseconds after `epoch` plus one; zero means "never sought".
    last_seek_nanos: AtomicU64,
    window_sequence: AtomicU64,
    window_start: AtomicI64,
    window_end: AtomicI64,
}

impl SharedTransport {
    pub fn new(window: PlaybackWindow) -> Self {
        Self {
            epoch: Instant::now(),
            position: AtomicI64::new(window.start()),
            direction: AtomicU8::new(Direction::Forward.to_u8()),
            at_boundary: AtomicBool::new(false),
            is_reading: AtomicBool::new(false),
            seek_mailbox: AtomicI64::new(NO_SEEK),
            seek_generation: AtomicU64::new(0),
            last_seek_nanos: AtomicU64::new(0),
            window_sequence: AtomicU64::new(0),
            window_start: AtomicI64::new(window.start()),
            window_end: AtomicI64::new(window.end()),
        }
    }

    // -- control side -----------------------------------------------------

    /// Post a seek. The caller is expected to have clamped `frame` already.
    ///
    /// The position is published right away so pollers see the target even
    /// before the render thread applies it; a pull already in flight may
    /// overwrite it once, which `seek_generation` lets observers detect.
    pub fn request_seek(&self, frame: FramePosition) {
        let nanos = u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX - 1);
        self.position.store(frame, Ordering::Release);
        self.at_boundary.store(false, Ordering::Release);
        self.last_seek_nanos
            .store(nanos.saturating_add(1), Ordering::Release);
        self.seek_generation.fetch_add(1, Ordering::AcqRel);
        self.seek_mailbox.store(frame, Ordering::Release);
    }

    pub fn request_direction(&self, direction: Direction) {
        self.direction.store(direction.to_u8(), Ordering::Release);
    }

    /// Publish a new window. Must only be called from one thread at a time.
    pub fn publish_window(&self, window: PlaybackWindow) {
        self.window_sequence.fetch_add(1, Ordering::AcqRel);
        self.window_start.store(window.start(), Ordering::Release);
        self.window_end.store(window.end(), Ordering::Release);
        self.window_sequence.fetch_add(1, Ordering::AcqRel);
    }

    // -- render side ------------------------------------------------------

    /// Take the pending seek, if any.
    pub fn take_seek(&self) -> Option<FramePosition> {
        match self.seek_mailbox.swap(NO_SEEK, Ordering::AcqRel) {
            NO_SEEK => None,
            frame => Some(frame),
        }
    }

    /// Read the window if it changed since `applied_sequence`.
    ///
    /// Returns `None` when nothing changed or a write is in progress; the
    /// caller simply retries on its next pull.
    pub fn window_if_changed(&self, applied_sequence: u64) -> Option<(PlaybackWindow, u64)> {
        let before = self.window_sequence.load(Ordering::Acquire);
        if before == applied_sequence || before % 2 == 1 {
            return None;
        }
        let start = self.window_start.load(Ordering::Acquire);
        let end = self.window_end.load(Ordering::Acquire);
        fence(Ordering::Acquire);
        let after = self.window_sequence.load(Ordering::Relaxed);
        (before == after).then(|| (PlaybackWindow::from_bounds(start, end), after))
    }

    pub fn publish_position(&self, position: FramePosition, at_boundary: bool) {
        self.position.store(position, Ordering::Release);
        self.at_boundary.store(at_boundary, Ordering::Release);
    }

    pub fn set_reading(&self, reading: bool) {
        self.is_reading.store(reading, Ordering::Release);
    }

    // -- either side ------------------------------------------------------

    pub fn position(&self) -> FramePosition {
        self.position.load(Ordering::Acquire)
    }

    pub fn direction(&self) -> Direction {
        Direction::from_u8(self.direction.load(Ordering::Acquire))
    }

    pub fn at_boundary(&self) -> bool {
        self.at_boundary.load(Ordering::Acquire)
    }

    pub fn is_reading(&self) -> bool {
        self.is_reading.load(Ordering::Acquire)
    }

    /// Monotonic counter bumped by every seek.
    pub fn seek_generation(&self) -> u64 {
        self.seek_generation.load(Ordering::Acquire)
    }

    /// When the most recent seek was posted.
    pub fn last_seek_time(&self) -> Option<Instant> {
        match self.last_seek_nanos.load(Ordering::Acquire) {
            0 => None,
            nanos => Some(self.epoch + Duration::from_nanos(nanos - 1)),
        }
    }

    /// Sequence of the window currently published, for initial bookkeeping.
    pub fn window_sequence(&self) -> u64 {
        self.window_sequence.load(Ordering::Acquire)
    }
}
