pub mod config;
pub mod constants;
pub mod diagnostics;
pub mod error;
pub mod format;
pub mod output;
pub mod reader;
pub mod reversal;
pub mod source;

pub use config::{OutputConfig, ReaderConfig};
pub use error::{AudioDeviceError, DecodeError, FormatError, OpenError, ReaderError};
pub use format::AudioFormatDescriptor;
pub use output::{AudioBackend, Output, OutputDataSource, OutputState};
pub use reader::{Reader, ReaderControl};
pub use source::FrameSource;
pub use transport::{Direction, FramePosition, PlaybackWindow};
