pub mod direction;
pub mod playhead;
pub mod shared;
pub mod window;

pub use direction::Direction;
pub use playhead::Playhead;
pub use shared::SharedTransport;
pub use window::{FramePosition, PlaybackWindow};
