use std::sync::atomic::{AtomicI64, Ordering};

use transport::FramePosition;

/// Receives the playback position after every pull.
///
/// Called on the render thread: implementations must return quickly and
/// must not block. Hand the value off (atomics, a lock-free queue) if real
/// work has to happen.
pub trait PositionObserver: Send + Sync {
    fn position_changed(&self, position: FramePosition);
}

/// Observer that keeps the latest reported position for a UI to poll.
#[derive(Debug, Default)]
pub struct PositionCell {
    position: AtomicI64,
}

impl PositionCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> FramePosition {
        self.position.load(Ordering::Acquire)
    }

    /// Position as a fraction of `total_frames`, for a scrubber.
    pub fn fraction_of(&self, total_frames: u64) -> f64 {
        if total_frames == 0 {
            return 0.0;
        }
        self.get() as f64 / total_frames as f64
    }
}

impl PositionObserver for PositionCell {
    fn position_changed(&self, position: FramePosition) {
        self.position.store(position, Ordering::Release);
    }
}
