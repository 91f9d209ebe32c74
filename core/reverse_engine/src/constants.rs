/// Tolerance when comparing decoded samples in tests.
pub const AUDIO_SAMPLE_EPSILON: f32 = 1e-6;

/// Frames decoded per reversal chunk.
pub const DEFAULT_CHUNK_FRAMES: usize = 4096;

/// Reversal chunks kept staged around the playback cursor.
pub const DEFAULT_LOOKAHEAD_DEPTH: usize = 4;

/// Largest pull the output renders in one go; bigger hardware requests are
/// split into blocks of this size.
pub const DEFAULT_MAX_PULL_FRAMES: usize = 4096;

/// Pending render-thread diagnostics before new ones are dropped.
pub const DIAGNOSTICS_CAPACITY: usize = 64;
