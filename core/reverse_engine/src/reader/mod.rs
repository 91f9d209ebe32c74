use std::{
    fs::File,
    io::BufReader,
    path::Path,
    sync::{Arc, Weak},
};

use log::{debug, info};
use transport::{Direction, FramePosition, PlaybackWindow, Playhead, SharedTransport};

use crate::{
    config::ReaderConfig,
    constants::DIAGNOSTICS_CAPACITY,
    diagnostics::{self, Diagnostic, DiagnosticsDrain, DiagnosticsSink},
    error::ReaderError,
    format::AudioFormatDescriptor,
    output::OutputDataSource,
    reversal::ReversalBuffer,
    source::{FrameSource, wav::WavFrameSource},
};

pub mod control;
pub mod observer;

pub use control::ReaderControl;
pub use observer::{PositionCell, PositionObserver};

/// Everything [`Reader::open`] hands back: the render-side reader, its
/// control-thread handle, and the diagnostics side channel.
pub type OpenedReader<S> = (Reader<S>, ReaderControl, DiagnosticsDrain);

/// Streams a file's frames forwards or backwards to a pull-based consumer.
///
/// The reader lives on the render thread. It owns the frame source and the
/// reversal buffer and is the only writer of the playback position;
/// seeks, direction and window changes arrive through [`ReaderControl`] and
/// are applied between pulls.
pub struct Reader<S: FrameSource> {
    source: S,
    reversal: ReversalBuffer,
    playhead: Playhead,
    shared: Arc<SharedTransport>,
    applied_window_sequence: u64,
    channels: usize,
    observer: Option<Weak<dyn PositionObserver>>,
    diagnostics: DiagnosticsSink,
}

impl<S: FrameSource> std::fmt::Debug for Reader<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("playhead", &self.playhead)
            .field("channels", &self.channels)
            .field("has_observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

impl Reader<WavFrameSource<BufReader<File>>> {
    /// Open a WAV file and deliver it in its own layout as interleaved `f32`.
    pub fn open_wav<P: AsRef<Path>>(
        path: P,
        config: ReaderConfig,
    ) -> Result<OpenedReader<WavFrameSource<BufReader<File>>>, ReaderError> {
        let source = WavFrameSource::open(path)?;
        let client_format = source.native_format().client_format();
        Self::open(source, client_format, config)
    }
}

impl<S: FrameSource> Reader<S> {
    /// Wrap `source`, checking that it can be delivered as `client_format`.
    ///
    /// All buffers used while pulling are allocated here.
    pub fn open(
        source: S,
        client_format: AudioFormatDescriptor,
        config: ReaderConfig,
    ) -> Result<OpenedReader<S>, ReaderError> {
        config.validate()?;

        let file_format = source.native_format();
        file_format.negotiate(&client_format)?;

        let total_frames = source.total_frames();
        let window = PlaybackWindow::full(total_frames);
        let shared = Arc::new(SharedTransport::new(window));
        let channels = usize::from(client_format.channels);
        let (sink, drain) = diagnostics::channel(DIAGNOSTICS_CAPACITY);

        info!(
            "reader open: {total_frames} frames, file [{file_format}], client [{client_format}]"
        );
        debug!(
            "reversal staging: {} chunks of {} frames",
            config.lookahead_depth, config.chunk_frames
        );

        let reader = Self {
            source,
            reversal: ReversalBuffer::new(config.chunk_frames, config.lookahead_depth, channels),
            playhead: Playhead::new(window),
            applied_window_sequence: shared.window_sequence(),
            shared: Arc::clone(&shared),
            channels,
            observer: None,
            diagnostics: sink,
        };
        let control =
            ReaderControl::new(shared, window, total_frames, file_format, client_format);
        Ok((reader, control, drain))
    }

    /// Register the position observer. The reader never keeps it alive.
    pub fn set_position_observer(&mut self, observer: Weak<dyn PositionObserver>) {
        self.observer = Some(observer);
    }

    pub fn clear_position_observer(&mut self) {
        self.observer = None;
    }

    pub fn position(&self) -> FramePosition {
        self.playhead.position()
    }

    pub fn direction(&self) -> Direction {
        self.playhead.direction()
    }

    pub fn window(&self) -> PlaybackWindow {
        self.playhead.window()
    }

    pub fn total_frames(&self) -> u64 {
        self.source.total_frames()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn reversal(&self) -> &ReversalBuffer {
        &self.reversal
    }

    /// Fill `destination` with up to `frames` frames in the current
    /// direction and advance the position by the number written.
    ///
    /// Returns fewer frames only when the window edge is reached. Undecodable
    /// frames are written as silence and still counted, so timing holds.
    ///
    /// Pending control requests are applied first. When driven by an
    /// [`crate::output::Output`], they are instead applied once per hardware
    /// tick through [`OutputDataSource::begin_tick`], so every sub-block of a
    /// tick sees the same position sequence.
    pub fn read_frames(&mut self, frames: usize, destination: &mut [f32]) -> usize {
        self.apply_control();
        self.pull(frames, destination)
    }

    fn pull(&mut self, frames: usize, destination: &mut [f32]) -> usize {
        self.shared.set_reading(true);

        let requested = frames.min(destination.len() / self.channels.max(1));
        let (first, span) = self.playhead.span(requested);
        let window = self.playhead.window();
        let pull = match self.playhead.direction() {
            Direction::Forward => {
                self.reversal
                    .read_forward(&mut self.source, window, first, span, destination)
            }
            Direction::Reverse => self.reversal.read_reverse(
                &mut self.source,
                window,
                first + span as FramePosition,
                span,
                destination,
            ),
        };

        if let Some(lost) = pull.lost {
            self.diagnostics.report(Diagnostic::DecodeFailed {
                first_frame: lost.first_frame as FramePosition,
                frames_lost: lost.frames,
                kind: lost.kind,
            });
        }

        let at_boundary = self.playhead.advance_by(pull.frames);
        let position = self.playhead.position();
        if pull.frames < requested {
            self.diagnostics.report(Diagnostic::ReachedBoundary {
                position,
                direction: self.playhead.direction(),
                requested,
                filled: pull.frames,
            });
        }
        self.shared.publish_position(position, at_boundary);

        if let Some(observer) = self.observer.as_ref().and_then(Weak::upgrade) {
            observer.position_changed(position);
        }

        self.shared.set_reading(false);
        pull.frames
    }

    /// Apply whatever the control thread posted since the last pull.
    ///
    /// The seek is taken before the window is read: a seek posted after a
    /// window change is then guaranteed to see that window.
    fn apply_control(&mut self) {
        let seek = self.shared.take_seek();

        if let Some((window, sequence)) = self.shared.window_if_changed(self.applied_window_sequence)
        {
            self.playhead.set_window(window);
            self.applied_window_sequence = sequence;
        }

        let direction = self.shared.direction();
        if direction != self.playhead.direction() {
            self.playhead.set_direction(direction);
            self.reversal.rebias(self.playhead.position());
        }

        if let Some(frame) = seek {
            let position = self.playhead.seek(frame);
            self.reversal.rebias(position);
        }
    }
}

impl<S: FrameSource> OutputDataSource for Reader<S> {
    fn begin_tick(&mut self) {
        self.apply_control();
    }

    fn read_frames(&mut self, frames: usize, destination: &mut [f32]) -> usize {
        self.pull(frames, destination)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        error::{DecodeError, DecodeErrorKind, FormatError},
        source::memory::MemoryFrameSource,
    };

    /// Mono source whose frame `i` holds the value `i`.
    fn mono_ramp(frames: usize) -> MemoryFrameSource {
        MemoryFrameSource::new((0..frames).map(|i| i as f32).collect(), 44100, 1).unwrap()
    }

    fn open_ramp(frames: usize) -> (Reader<MemoryFrameSource>, ReaderControl) {
        let source = mono_ramp(frames);
        let format = source.native_format();
        let config = ReaderConfig {
            chunk_frames: 64,
            lookahead_depth: 4,
        };
        let (reader, control, _) = Reader::open(source, format, config).unwrap();
        (reader, control)
    }

    fn pull(reader: &mut Reader<MemoryFrameSource>, frames: usize) -> Vec<f32> {
        let mut buffer = vec![-1.0f32; frames];
        let filled = reader.read_frames(frames, &mut buffer);
        buffer.truncate(filled);
        buffer
    }

    #[test]
    fn test_reverse_from_end_of_window() {
        let (mut reader, control) = open_ramp(1000);
        control.set_direction(Direction::Reverse);
        control.seek(1000);

        let out = pull(&mut reader, 100);
        let expected: Vec<f32> = (900..1000).rev().map(|i| i as f32).collect();
        assert_eq!(out, expected);
        assert_eq!(reader.position(), 900);
        assert_eq!(control.position(), 900);
    }

    #[test]
    fn test_forward_pull_clips_at_end() {
        let (mut reader, control) = open_ramp(1000);
        control.seek(950);

        let out = pull(&mut reader, 100);
        assert_eq!(out.len(), 50);
        assert_eq!(reader.position(), 1000);
        assert!(control.at_boundary());
    }

    #[test]
    fn test_repeated_seek_is_idempotent() {
        let (mut once, once_control) = open_ramp(1000);
        let (mut twice, twice_control) = open_ramp(1000);

        once_control.seek(333);
        twice_control.seek(333);
        twice_control.seek(333);

        assert_eq!(pull(&mut once, 64), pull(&mut twice, 64));
        assert_eq!(pull(&mut once, 64), pull(&mut twice, 64));
    }

    #[test]
    fn test_seek_is_clamped_to_window() {
        let (mut reader, mut control) = open_ramp(1000);
        control.set_window(200, 400);
        assert_eq!(control.seek(50), 200);
        assert_eq!(control.seek(5000), 400);

        pull(&mut reader, 1);
        assert_eq!(reader.position(), 400);
    }

    #[test]
    fn test_window_narrows_playback() {
        let (mut reader, mut control) = open_ramp(1000);
        control.set_window(100, 200);
        control.seek(150);
        control.set_direction(Direction::Reverse);

        let out = pull(&mut reader, 100);
        assert_eq!(out.len(), 50);
        assert_eq!(out.last(), Some(&100.0));
        assert!(control.at_boundary());
    }

    #[test]
    fn test_direction_change_keeps_position() {
        let (mut reader, control) = open_ramp(1000);
        control.seek(500);
        pull(&mut reader, 10);
        assert_eq!(reader.position(), 510);

        control.set_direction(Direction::Reverse);
        let out = pull(&mut reader, 3);
        assert_eq!(out, vec![509.0, 508.0, 507.0]);
        assert_eq!(reader.position(), 507);
    }

    #[test]
    fn test_forward_then_reverse_round_trip() {
        let (mut reader, control) = open_ramp(777);

        let forward = pull(&mut reader, 777);
        control.set_direction(Direction::Reverse);
        let mut reverse = Vec::new();
        loop {
            let block = pull(&mut reader, 50);
            if block.is_empty() {
                break;
            }
            reverse.extend(block);
        }

        reverse.reverse();
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_observer_sees_each_pull() {
        let (mut reader, _control) = open_ramp(1000);
        let cell = Arc::new(PositionCell::new());
        let observer: Arc<dyn PositionObserver> = cell.clone();
        reader.set_position_observer(Arc::downgrade(&observer));

        pull(&mut reader, 10);
        assert_eq!(cell.get(), 10);
        pull(&mut reader, 15);
        assert_eq!(cell.get(), 25);
    }

    #[test]
    fn test_dropped_observer_is_tolerated() {
        let (mut reader, _control) = open_ramp(100);
        let observer: Arc<dyn PositionObserver> = Arc::new(PositionCell::new());
        reader.set_position_observer(Arc::downgrade(&observer));
        drop(observer);

        assert_eq!(pull(&mut reader, 10).len(), 10);
    }

    #[test]
    fn test_mismatched_client_format_fails_to_open() {
        let source = mono_ramp(10);
        let client = AudioFormatDescriptor::float32_interleaved(48000, 1);
        let result = Reader::open(source, client, ReaderConfig::default());
        assert!(matches!(
            result,
            Err(ReaderError::Format(FormatError::Mismatch { .. }))
        ));
    }

    #[test]
    fn test_invalid_config_fails_to_open() {
        let source = mono_ramp(10);
        let format = source.native_format();
        let config = ReaderConfig {
            chunk_frames: 64,
            lookahead_depth: 0,
        };
        assert!(matches!(
            Reader::open(source, format, config),
            Err(ReaderError::Config(_))
        ));
    }

    struct FailingTail {
        inner: MemoryFrameSource,
        fails_at: u64,
    }

    impl FrameSource for FailingTail {
        fn total_frames(&self) -> u64 {
            self.inner.total_frames()
        }

        fn native_format(&self) -> AudioFormatDescriptor {
            self.inner.native_format()
        }

        fn fill(&mut self, start: u64, count: usize, dest: &mut [f32]) -> Result<usize, DecodeError> {
            let filled = self.inner.fill(start, count, dest)?;
            if start + filled as u64 > self.fails_at {
                let good = self.fails_at.saturating_sub(start) as usize;
                return Err(DecodeError::new(good, DecodeErrorKind::UnexpectedEof));
            }
            Ok(filled)
        }
    }

    #[test]
    fn test_decode_failure_becomes_silence_and_diagnostic() {
        let source = FailingTail {
            inner: mono_ramp(100),
            fails_at: 60,
        };
        let format = source.native_format();
        let (mut reader, _control, mut drain) =
            Reader::open(source, format, ReaderConfig::default()).unwrap();

        let mut buffer = vec![-1.0f32; 100];
        let filled = reader.read_frames(100, &mut buffer);

        assert_eq!(filled, 100);
        assert_eq!(buffer[59], 59.0);
        assert!(buffer[60..].iter().all(|&s| s == 0.0));
        assert_eq!(reader.position(), 100);
        assert!(matches!(
            drain.try_next(),
            Some(Diagnostic::DecodeFailed {
                first_frame: 60,
                frames_lost: 40,
                ..
            })
        ));
    }

    #[test]
    fn test_control_is_latched_per_tick() {
        let (mut reader, control) = open_ramp(1000);
        let source: &mut dyn OutputDataSource = &mut reader;
        let mut buffer = [0.0f32; 4];

        source.begin_tick();
        source.read_frames(4, &mut buffer);
        control.seek(500);
        source.read_frames(4, &mut buffer);
        assert_eq!(buffer, [4.0, 5.0, 6.0, 7.0]);

        source.begin_tick();
        source.read_frames(4, &mut buffer);
        assert_eq!(buffer, [500.0, 501.0, 502.0, 503.0]);
    }

    #[test]
    fn test_reading_flag_is_clear_between_pulls() {
        let (mut reader, control) = open_ramp(100);
        pull(&mut reader, 10);
        assert!(!control.is_reading());
    }
}
