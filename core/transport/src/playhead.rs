use crate::{
    direction::Direction,
    window::{FramePosition, PlaybackWindow},
};

/// Render-side playback cursor.
///
/// Owned by the thread that pulls frames; it is the single writer of the
/// playback position. Control threads never touch it directly, their
/// requests reach it through [`crate::SharedTransport`].
#[derive(Debug, Clone, Copy)]
pub struct Playhead {
    position: FramePosition,
    direction: Direction,
    window: PlaybackWindow,
}

impl Playhead {
    pub fn new(window: PlaybackWindow) -> Self {
        Self {
            position: window.start(),
            direction: Direction::Forward,
            window,
        }
    }

    pub const fn position(&self) -> FramePosition {
        self.position
    }

    pub const fn direction(&self) -> Direction {
        self.direction
    }

    pub const fn window(&self) -> PlaybackWindow {
        self.window
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Move the cursor, clamped to the window. Returns the applied position.
    pub fn seek(&mut self, frame: FramePosition) -> FramePosition {
        self.position = self.window.clamp(frame);
        self.position
    }

    /// Replace the window and pull the cursor back inside it.
    pub fn set_window(&mut self, window: PlaybackWindow) {
        self.window = window;
        self.position = window.clamp(self.position);
    }

    /// File-order range `[first, first + frames)` the next pull of
    /// `requested` frames covers, clipped to the window.
    pub fn span(&self, requested: usize) -> (FramePosition, usize) {
        let available = self.window.available(self.position, self.direction);
        let frames = (requested as u64).min(available) as usize;
        let first = match self.direction {
            Direction::Forward => self.position,
            Direction::Reverse => self.position - frames as FramePosition,
        };
        (first, frames)
    }

    /// Advance by `frames` in the active direction.
    ///
    /// Returns `true` when the cursor sits on the window boundary afterwards.
    pub fn advance_by(&mut self, frames: usize) -> bool {
        let delta = frames as FramePosition;
        let next = match self.direction {
            Direction::Forward => self.position.saturating_add(delta),
            Direction::Reverse => self.position.saturating_sub(delta),
        };
        self.position = self.window.clamp(next);
        self.at_boundary()
    }

    pub fn at_boundary(&self) -> bool {
        self.position == self.window.boundary(self.direction)
    }
}
