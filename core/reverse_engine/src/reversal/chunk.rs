use crate::{error::DecodeErrorKind, source::FrameSource};

use super::LostFrames;

/// A block of forward-decoded frames, tagged with its file-order start.
///
/// Storage is sized once at construction; reloading a chunk reuses it.
#[derive(Debug)]
pub struct ReversalChunk {
    start: u64,
    len: usize,
    /// Leading frames that decoded cleanly; the rest are silence.
    decoded: usize,
    failure: Option<DecodeErrorKind>,
    valid: bool,
    samples: Vec<f32>,
}

impl ReversalChunk {
    pub(crate) fn with_capacity(frames: usize, channels: usize) -> Self {
        Self {
            start: 0,
            len: 0,
            decoded: 0,
            failure: None,
            valid: false,
            samples: vec![0.0; frames * channels],
        }
    }

    pub const fn start(&self) -> u64 {
        self.start
    }

    pub const fn end(&self) -> u64 {
        self.start + self.len as u64
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    pub const fn covers(&self, frame: u64) -> bool {
        self.valid && frame >= self.start && frame < self.end()
    }

    /// Distance in frames between this chunk and `position`; zero if the
    /// chunk straddles it.
    pub const fn distance_to(&self, position: u64) -> u64 {
        if position < self.start {
            self.start - position
        } else if position > self.end() {
            position - self.end()
        } else {
            0
        }
    }

    /// Interleaved samples of `count` frames starting at file frame `frame`.
    pub fn frames(&self, frame: u64, count: usize, channels: usize) -> &[f32] {
        let offset = (frame - self.start) as usize * channels;
        &self.samples[offset..offset + count * channels]
    }

    /// Undecodable frames of this chunk inside `[from, to)`.
    pub fn lost_within(&self, from: u64, to: u64) -> Option<LostFrames> {
        let kind = self.failure?;
        let first = (self.start + self.decoded as u64).max(from);
        let last = self.end().min(to);
        (first < last).then(|| LostFrames {
            first_frame: first,
            frames: (last - first) as usize,
            kind,
        })
    }

    pub(crate) fn load<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
        start: u64,
        len: usize,
        channels: usize,
    ) {
        let len = len.min(self.samples.len() / channels.max(1));
        let staged = &mut self.samples[..len * channels];
        let (decoded, failure) = match source.fill(start, len, staged) {
            Ok(filled) if filled >= len => (len, None),
            Ok(filled) => (filled, Some(DecodeErrorKind::UnexpectedEof)),
            Err(e) => (e.frames_filled.min(len), Some(e.kind)),
        };
        staged[decoded * channels..].fill(0.0);

        self.start = start;
        self.len = len;
        self.decoded = decoded;
        self.failure = failure;
        self.valid = true;
    }

    pub(crate) fn invalidate(&mut self) {
        self.valid = false;
    }
}
