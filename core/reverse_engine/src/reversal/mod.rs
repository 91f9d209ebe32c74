//! Serves frames backwards in time while only ever asking the
//! [`FrameSource`] for forward reads.
//!
//! The file is divided into fixed, chunk-aligned blocks. A reverse pull walks
//! the blocks it needs from the highest downwards, decoding any block that is
//! not staged yet with a single forward fill, and copies frames out in
//! descending file order. Per-frame channel layout is left untouched; only
//! the order of frames is reversed.
//!
//! At most `lookahead_depth` blocks are staged. When a new block is needed
//! the one farthest from the cursor is recycled, so memory stays bounded and
//! every buffer is allocated up front.

use transport::{FramePosition, PlaybackWindow};

use crate::{error::DecodeErrorKind, source::FrameSource};

pub mod chunk;

use chunk::ReversalChunk;

/// Frames that failed to decode and were replaced by silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LostFrames {
    pub first_frame: u64,
    pub frames: usize,
    pub kind: DecodeErrorKind,
}

impl LostFrames {
    fn merge(current: Option<Self>, next: Option<Self>) -> Option<Self> {
        match (current, next) {
            (Some(a), Some(b)) => Some(Self {
                first_frame: a.first_frame.min(b.first_frame),
                frames: a.frames + b.frames,
                kind: a.kind,
            }),
            (a, b) => a.or(b),
        }
    }
}

/// Result of one pull through the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pull {
    /// Frames written to the destination, silence substitutions included.
    pub frames: usize,
    pub lost: Option<LostFrames>,
}

#[derive(Debug)]
pub struct ReversalBuffer {
    chunks: Vec<ReversalChunk>,
    chunk_frames: usize,
    channels: usize,
}

impl ReversalBuffer {
    pub fn new(chunk_frames: usize, lookahead_depth: usize, channels: usize) -> Self {
        let chunk_frames = chunk_frames.max(1);
        let chunks = (0..lookahead_depth.max(1))
            .map(|_| ReversalChunk::with_capacity(chunk_frames, channels))
            .collect();
        Self {
            chunks,
            chunk_frames,
            channels,
        }
    }

    pub fn chunk_frames(&self) -> usize {
        self.chunk_frames
    }

    pub fn lookahead_depth(&self) -> usize {
        self.chunks.len()
    }

    /// Chunks currently holding decoded frames.
    pub fn staged_chunks(&self) -> impl Iterator<Item = &ReversalChunk> {
        self.chunks.iter().filter(|c| c.is_valid())
    }

    /// Fill `destination` with up to `frames` frames ending just below
    /// `upper`, newest first: file frame `upper - 1` becomes output frame 0.
    ///
    /// The range is clipped to `window`; running into the window start
    /// yields a short pull.
    pub fn read_reverse<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
        window: PlaybackWindow,
        upper: FramePosition,
        frames: usize,
        destination: &mut [f32],
    ) -> Pull {
        let channels = self.channels;
        let upper = upper.min(window.end());
        let lower = upper
            .saturating_sub(frames as FramePosition)
            .max(window.start());
        if upper <= lower || channels == 0 {
            return Pull::default();
        }
        let frames = ((upper - lower) as usize).min(destination.len() / channels);
        let lower = (upper - frames as FramePosition) as u64;
        let total_frames = source.total_frames();

        let mut pull = Pull::default();
        let mut cursor = upper as u64;
        while cursor > lower {
            let key = (cursor - 1) / self.chunk_frames as u64;
            let slot = self.stage(source, key, total_frames, cursor);
            let chunk = &self.chunks[slot];
            if !chunk.covers(cursor - 1) {
                // source is shorter than the window claims
                break;
            }

            let from = chunk.start().max(lower);
            for frame in (from..cursor).rev() {
                let out = pull.frames * channels;
                destination[out..out + channels].copy_from_slice(chunk.frames(frame, 1, channels));
                pull.frames += 1;
            }
            pull.lost = LostFrames::merge(pull.lost, chunk.lost_within(from, cursor));
            cursor = from;
        }
        pull
    }

    /// Fill `destination` with up to `frames` frames from `start` in file
    /// order, clipped to `window`.
    ///
    /// Frames already staged are copied from the cache; everything else is a
    /// direct pass-through fill from the source.
    pub fn read_forward<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
        window: PlaybackWindow,
        start: FramePosition,
        frames: usize,
        destination: &mut [f32],
    ) -> Pull {
        let channels = self.channels;
        let start = start.max(window.start());
        let end = start
            .saturating_add(frames as FramePosition)
            .min(window.end());
        if end <= start || channels == 0 {
            return Pull::default();
        }
        let frames = ((end - start) as usize).min(destination.len() / channels);
        let start = start as u64;

        let mut pull = Pull::default();
        while pull.frames < frames {
            let frame = start + pull.frames as u64;
            let out = pull.frames * channels;

            if let Some(chunk) = self.chunks.iter().find(|c| c.covers(frame)) {
                let run = (frames - pull.frames).min((chunk.end() - frame) as usize);
                destination[out..out + run * channels]
                    .copy_from_slice(chunk.frames(frame, run, channels));
                pull.lost = LostFrames::merge(pull.lost, chunk.lost_within(frame, frame + run as u64));
                pull.frames += run;
                continue;
            }

            let rest = frames - pull.frames;
            let target = &mut destination[out..frames * channels];
            let (filled, failure) = match source.fill(frame, rest, target) {
                Ok(filled) if filled >= rest => (rest, None),
                Ok(filled) => (filled, Some(DecodeErrorKind::UnexpectedEof)),
                Err(e) => (e.frames_filled.min(rest), Some(e.kind)),
            };
            target[filled * channels..].fill(0.0);
            if let Some(kind) = failure {
                pull.lost = LostFrames::merge(
                    pull.lost,
                    Some(LostFrames {
                        first_frame: frame + filled as u64,
                        frames: rest - filled,
                        kind,
                    }),
                );
            }
            pull.frames = frames;
        }
        pull
    }

    /// Drop staged chunks that fall outside the retention span around
    /// `position`. Called after a seek or a direction change.
    pub fn rebias(&mut self, position: FramePosition) {
        let position = position.max(0) as u64;
        let retention = (self.chunk_frames * self.chunks.len()) as u64;
        for chunk in self.chunks.iter_mut().filter(|c| c.is_valid()) {
            if chunk.distance_to(position) > retention {
                chunk.invalidate();
            }
        }
    }

    pub fn clear(&mut self) {
        for chunk in &mut self.chunks {
            chunk.invalidate();
        }
    }

    /// Index of the slot holding block `key`, decoding it if needed.
    fn stage<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
        key: u64,
        total_frames: u64,
        cursor: u64,
    ) -> usize {
        let start = key * self.chunk_frames as u64;
        if let Some(slot) = self
            .chunks
            .iter()
            .position(|c| c.is_valid() && c.start() == start)
        {
            return slot;
        }

        let slot = self.victim(cursor);
        let len = total_frames
            .saturating_sub(start)
            .min(self.chunk_frames as u64) as usize;
        self.chunks[slot].load(source, start, len, self.channels);
        slot
    }

    /// An empty slot, or the staged chunk farthest from `cursor`.
    fn victim(&self, cursor: u64) -> usize {
        if let Some(slot) = self.chunks.iter().position(|c| !c.is_valid()) {
            return slot;
        }
        self.chunks
            .iter()
            .enumerate()
            .max_by_key(|(_, c)| c.distance_to(cursor))
            .map_or(0, |(slot, _)| slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::DecodeError, format::AudioFormatDescriptor, source::memory::MemoryFrameSource,
    };

    /// Stereo source whose frame `i` is `[i, -i]`.
    fn stereo_ramp(frames: usize) -> MemoryFrameSource {
        let samples = (0..frames)
            .flat_map(|i| [i as f32, -(i as f32)])
            .collect();
        MemoryFrameSource::new(samples, 44100, 2).unwrap()
    }

    /// Wraps a source and counts how often it is asked to decode.
    struct CountingSource {
        inner: MemoryFrameSource,
        fills: usize,
    }

    impl FrameSource for CountingSource {
        fn total_frames(&self) -> u64 {
            self.inner.total_frames()
        }

        fn native_format(&self) -> AudioFormatDescriptor {
            self.inner.native_format()
        }

        fn fill(&mut self, start: u64, count: usize, dest: &mut [f32]) -> Result<usize, DecodeError> {
            self.fills += 1;
            self.inner.fill(start, count, dest)
        }
    }

    /// Source whose frames from `corrupt_from` on cannot be decoded.
    struct CorruptSource {
        inner: MemoryFrameSource,
        corrupt_from: u64,
    }

    impl FrameSource for CorruptSource {
        fn total_frames(&self) -> u64 {
            self.inner.total_frames()
        }

        fn native_format(&self) -> AudioFormatDescriptor {
            self.inner.native_format()
        }

        fn fill(&mut self, start: u64, count: usize, dest: &mut [f32]) -> Result<usize, DecodeError> {
            let filled = self.inner.fill(start, count, dest)?;
            if start + filled as u64 > self.corrupt_from {
                let good = self.corrupt_from.saturating_sub(start) as usize;
                return Err(DecodeError::new(good, DecodeErrorKind::Malformed("bad block")));
            }
            Ok(filled)
        }
    }

    fn left_channel(buffer: &[f32], frames: usize) -> Vec<f32> {
        buffer.chunks_exact(2).take(frames).map(|f| f[0]).collect()
    }

    #[test]
    fn test_reverse_pull_returns_descending_frames() {
        let mut source = stereo_ramp(1000);
        let mut buffer = ReversalBuffer::new(64, 4, 2);
        let mut dest = vec![0.0f32; 200];

        let pull = buffer.read_reverse(&mut source, PlaybackWindow::full(1000), 1000, 100, &mut dest);

        assert_eq!(pull.frames, 100);
        assert!(pull.lost.is_none());
        let expected: Vec<f32> = (900..1000).rev().map(|i| i as f32).collect();
        assert_eq!(left_channel(&dest, 100), expected);
    }

    #[test]
    fn test_reverse_keeps_channel_order_within_frame() {
        let mut source = stereo_ramp(100);
        let mut buffer = ReversalBuffer::new(16, 4, 2);
        let mut dest = vec![0.0f32; 6];

        buffer.read_reverse(&mut source, PlaybackWindow::full(100), 50, 3, &mut dest);
        assert_eq!(dest, vec![49.0, -49.0, 48.0, -48.0, 47.0, -47.0]);
    }

    #[test]
    fn test_reverse_pull_stops_at_window_start() {
        let mut source = stereo_ramp(1000);
        let mut buffer = ReversalBuffer::new(64, 4, 2);
        let window = PlaybackWindow::clamped(100, 1000, 1000);
        let mut dest = vec![7.0f32; 200];

        let pull = buffer.read_reverse(&mut source, window, 130, 100, &mut dest);

        assert_eq!(pull.frames, 30);
        assert_eq!(left_channel(&dest, 30).last(), Some(&100.0));
        // nothing outside the window was written
        assert_eq!(dest[60], 7.0);
    }

    #[test]
    fn test_staged_chunks_are_reused() {
        let mut source = CountingSource {
            inner: stereo_ramp(1000),
            fills: 0,
        };
        let mut buffer = ReversalBuffer::new(100, 4, 2);
        let mut dest = vec![0.0f32; 100];
        let window = PlaybackWindow::full(1000);

        buffer.read_reverse(&mut source, window, 1000, 50, &mut dest);
        buffer.read_reverse(&mut source, window, 950, 50, &mut dest);
        // both pulls live in block [900, 1000)
        assert_eq!(source.fills, 1);

        buffer.read_reverse(&mut source, window, 900, 50, &mut dest);
        assert_eq!(source.fills, 2);
    }

    #[test]
    fn test_staging_is_bounded_by_lookahead_depth() {
        let mut source = stereo_ramp(1000);
        let mut buffer = ReversalBuffer::new(50, 3, 2);
        let mut dest = vec![0.0f32; 2 * 40];
        let window = PlaybackWindow::full(1000);

        let mut position = 1000;
        while position > 0 {
            let pull = buffer.read_reverse(&mut source, window, position, 40, &mut dest);
            position -= pull.frames as FramePosition;
            assert!(buffer.staged_chunks().count() <= 3);
        }
        assert_eq!(position, 0);
    }

    #[test]
    fn test_pull_larger_than_staging_still_completes() {
        let mut source = stereo_ramp(1000);
        let mut buffer = ReversalBuffer::new(16, 2, 2);
        let mut dest = vec![0.0f32; 2 * 300];

        let pull = buffer.read_reverse(&mut source, PlaybackWindow::full(1000), 700, 300, &mut dest);

        assert_eq!(pull.frames, 300);
        let expected: Vec<f32> = (400..700).rev().map(|i| i as f32).collect();
        assert_eq!(left_channel(&dest, 300), expected);
    }

    #[test]
    fn test_forward_pull_is_file_order_and_clipped() {
        let mut source = stereo_ramp(1000);
        let mut buffer = ReversalBuffer::new(64, 4, 2);
        let mut dest = vec![0.0f32; 200];

        let pull = buffer.read_forward(&mut source, PlaybackWindow::full(1000), 950, 100, &mut dest);

        assert_eq!(pull.frames, 50);
        let expected: Vec<f32> = (950..1000).map(|i| i as f32).collect();
        assert_eq!(left_channel(&dest, 50), expected);
    }

    #[test]
    fn test_forward_after_reverse_reuses_cache() {
        let mut source = CountingSource {
            inner: stereo_ramp(1000),
            fills: 0,
        };
        let mut buffer = ReversalBuffer::new(100, 4, 2);
        let mut dest = vec![0.0f32; 200];
        let window = PlaybackWindow::full(1000);

        buffer.read_reverse(&mut source, window, 600, 50, &mut dest);
        assert_eq!(source.fills, 1);

        let pull = buffer.read_forward(&mut source, window, 550, 50, &mut dest);
        assert_eq!(pull.frames, 50);
        assert_eq!(source.fills, 1);
        let expected: Vec<f32> = (550..600).map(|i| i as f32).collect();
        assert_eq!(left_channel(&dest, 50), expected);
    }

    #[test]
    fn test_reverse_over_corrupt_block_substitutes_silence() {
        let mut source = CorruptSource {
            inner: stereo_ramp(200),
            corrupt_from: 150,
        };
        let mut buffer = ReversalBuffer::new(100, 2, 2);
        let mut dest = vec![1.0f32; 2 * 100];

        let pull = buffer.read_reverse(&mut source, PlaybackWindow::full(200), 200, 100, &mut dest);

        assert_eq!(pull.frames, 100);
        let lost = pull.lost.unwrap();
        assert_eq!((lost.first_frame, lost.frames), (150, 50));
        // frames 199..150 are silent, 149..100 intact
        assert!(dest[..100].iter().all(|&s| s == 0.0));
        assert_eq!(dest[100], 149.0);
    }

    #[test]
    fn test_forward_over_corrupt_region_reports_loss() {
        let mut source = CorruptSource {
            inner: stereo_ramp(200),
            corrupt_from: 120,
        };
        let mut buffer = ReversalBuffer::new(100, 2, 2);
        let mut dest = vec![1.0f32; 2 * 50];

        let pull = buffer.read_forward(&mut source, PlaybackWindow::full(200), 100, 50, &mut dest);

        assert_eq!(pull.frames, 50);
        assert_eq!(pull.lost.map(|l| (l.first_frame, l.frames)), Some((120, 30)));
        assert_eq!(dest[2 * 19], 119.0);
        assert!(dest[2 * 20..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_rebias_drops_far_chunks() {
        let mut source = stereo_ramp(10_000);
        let mut buffer = ReversalBuffer::new(100, 2, 2);
        let mut dest = vec![0.0f32; 200];

        buffer.read_reverse(&mut source, PlaybackWindow::full(10_000), 10_000, 100, &mut dest);
        assert_eq!(buffer.staged_chunks().count(), 1);

        buffer.rebias(9_850);
        assert_eq!(buffer.staged_chunks().count(), 1);

        buffer.rebias(100);
        assert_eq!(buffer.staged_chunks().count(), 0);
    }
}
