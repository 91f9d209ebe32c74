use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use log::{debug, warn};
use rtrb::{Consumer, Producer, RingBuffer};
use transport::{Direction, FramePosition};

use crate::error::DecodeErrorKind;

/// Something the render thread noticed but cannot report synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    /// Frames that could not be decoded and were replaced by silence.
    DecodeFailed {
        first_frame: FramePosition,
        frames_lost: usize,
        kind: DecodeErrorKind,
    },
    /// A pull came back short because the cursor reached the window edge.
    ReachedBoundary {
        position: FramePosition,
        direction: Direction,
        requested: usize,
        filled: usize,
    },
}

/// Build a bounded diagnostics channel.
pub fn channel(capacity: usize) -> (DiagnosticsSink, DiagnosticsDrain) {
    let (producer, consumer) = RingBuffer::new(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    (
        DiagnosticsSink {
            producer,
            dropped: Arc::clone(&dropped),
        },
        DiagnosticsDrain { consumer, dropped },
    )
}

/// Render-side end. Reporting never blocks or allocates; a full ring drops
/// the diagnostic and counts it.
#[derive(Debug)]
pub struct DiagnosticsSink {
    producer: Producer<Diagnostic>,
    dropped: Arc<AtomicU64>,
}

impl DiagnosticsSink {
    pub fn report(&mut self, diagnostic: Diagnostic) {
        if self.producer.push(diagnostic).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Control-side end.
#[derive(Debug)]
pub struct DiagnosticsDrain {
    consumer: Consumer<Diagnostic>,
    dropped: Arc<AtomicU64>,
}

impl DiagnosticsDrain {
    pub fn try_next(&mut self) -> Option<Diagnostic> {
        self.consumer.pop().ok()
    }

    /// Diagnostics lost because the ring was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Pop everything pending and write it to the log. Returns how many
    /// diagnostics were logged.
    pub fn drain_and_log(&mut self) -> usize {
        let mut count = 0;
        while let Some(diagnostic) = self.try_next() {
            match diagnostic {
                Diagnostic::DecodeFailed {
                    first_frame,
                    frames_lost,
                    kind,
                } => warn!(
                    "substituted silence for {frames_lost} undecodable frames at {first_frame}: {kind}"
                ),
                Diagnostic::ReachedBoundary {
                    position,
                    direction,
                    requested,
                    filled,
                } => debug!(
                    "{direction:?} pull reached window edge at {position} ({filled}/{requested} frames)"
                ),
            }
            count += 1;
        }

        let dropped = self.dropped.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            warn!("{dropped} render diagnostics dropped (ring full)");
        }
        count
    }
}
