use crate::direction::Direction;

/// Signed frame index into a file.
pub type FramePosition = i64;

/// The `[start, end)` frame range eligible for playback.
///
/// Always satisfies `0 <= start <= end <= total_frames` for the file it was
/// built against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackWindow {
    start: FramePosition,
    end: FramePosition,
}

impl PlaybackWindow {
    /// Whole-file window `[0, total_frames)`.
    pub fn full(total_frames: u64) -> Self {
        Self {
            start: 0,
            end: clamp_total(total_frames),
        }
    }

    /// Narrowed window, clamped into `[0, total_frames]`.
    ///
    /// A reversed pair collapses to an empty window at `start`.
    pub fn clamped(start: FramePosition, end: FramePosition, total_frames: u64) -> Self {
        let total = clamp_total(total_frames);
        let start = start.clamp(0, total);
        let end = end.clamp(start, total);
        Self { start, end }
    }

    /// Rebuild a window from bounds that were validated when first built.
    pub(crate) const fn from_bounds(start: FramePosition, end: FramePosition) -> Self {
        Self { start, end }
    }

    pub const fn start(&self) -> FramePosition {
        self.start
    }

    pub const fn end(&self) -> FramePosition {
        self.end
    }

    pub const fn len(&self) -> u64 {
        (self.end - self.start) as u64
    }

    pub const fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// `true` if `frame` is a playable frame of this window.
    pub const fn contains(&self, frame: FramePosition) -> bool {
        frame >= self.start && frame < self.end
    }

    /// Clamp a position into `[start, end]` (the end is a valid cursor).
    pub fn clamp(&self, position: FramePosition) -> FramePosition {
        position.clamp(self.start, self.end)
    }

    /// Frames that can still be consumed from `position` moving in `direction`.
    pub fn available(&self, position: FramePosition, direction: Direction) -> u64 {
        let position = self.clamp(position);
        match direction {
            Direction::Forward => (self.end - position) as u64,
            Direction::Reverse => (position - self.start) as u64,
        }
    }

    /// The boundary a cursor moving in `direction` eventually hits.
    pub const fn boundary(&self, direction: Direction) -> FramePosition {
        match direction {
            Direction::Forward => self.end,
            Direction::Reverse => self.start,
        }
    }
}

fn clamp_total(total_frames: u64) -> FramePosition {
    FramePosition::try_from(total_frames).unwrap_or(FramePosition::MAX)
}
