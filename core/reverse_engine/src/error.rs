use std::io;

use thiserror::Error;

use crate::{format::AudioFormatDescriptor, output::OutputState};

/// Failure to open a frame source. No partial reader is ever returned.
#[derive(Error, Debug)]
pub enum OpenError {
    #[error("failed to open audio file: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse WAV container: {0}")]
    Wav(#[from] hound::Error),

    #[error("unsupported audio file: {0}")]
    Unsupported(String),

    #[error("audio file contains no frames")]
    Empty,
}

/// The requested client format cannot be served from the file format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("client format [{client}] does not match file format [{file}] and no converter is available")]
    Mismatch {
        file: AudioFormatDescriptor,
        client: AudioFormatDescriptor,
    },

    #[error("unsupported format: {0}")]
    Unsupported(String),
}

/// Why part of a fill could not be decoded.
///
/// Kept allocation-free so it can be produced on the render thread.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    #[error("I/O error ({0:?})")]
    Io(io::ErrorKind),

    #[error("malformed data: {0}")]
    Malformed(&'static str),

    #[error("unexpected end of data")]
    UnexpectedEof,

    #[error("unsupported sample encoding")]
    Unsupported,
}

impl From<hound::Error> for DecodeErrorKind {
    fn from(value: hound::Error) -> Self {
        match value {
            hound::Error::IoError(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Self::UnexpectedEof
            }
            hound::Error::IoError(e) => Self::Io(e.kind()),
            hound::Error::FormatError(reason) => Self::Malformed(reason),
            hound::Error::UnfinishedSample => Self::UnexpectedEof,
            _ => Self::Unsupported,
        }
    }
}

/// Corrupt data hit mid-fill. Frames before `frames_filled` are valid.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("decode failed after {frames_filled} frames: {kind}")]
pub struct DecodeError {
    pub frames_filled: usize,
    pub kind: DecodeErrorKind,
}

impl DecodeError {
    pub fn new(frames_filled: usize, kind: impl Into<DecodeErrorKind>) -> Self {
        Self {
            frames_filled,
            kind: kind.into(),
        }
    }
}

/// Errors surfaced by [`crate::reader::Reader::open`].
#[derive(Error, Debug)]
pub enum ReaderError {
    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("invalid reader configuration: {0}")]
    Config(String),
}

/// Output lifecycle and hardware failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioDeviceError {
    #[error("no data source registered with the output")]
    NoDataSource,

    #[error("no output device found")]
    DeviceNotFound,

    #[error("failed to build output stream: {0}")]
    StreamBuildFailed(String),

    #[error("failed to start output stream: {0}")]
    StreamStartFailed(String),

    #[error("operation not allowed while output is {0:?}")]
    InvalidState(OutputState),
}
