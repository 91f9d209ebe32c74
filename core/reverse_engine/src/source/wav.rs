use std::{
    fmt,
    fs::File,
    io::{BufReader, Read, Seek},
    path::Path,
};

use hound::WavReader;
use log::debug;

use crate::{
    error::{DecodeError, DecodeErrorKind, OpenError},
    format::{AudioFormatDescriptor, SampleKind},
    source::{FrameSource, clip_fill, memory::MemoryFrameSource},
};

/// Marks the decoder position as unknown after a failed read.
const NEEDS_SEEK: u64 = u64::MAX;

/// `WavFrameSource` streams frames out of a `.wav` container on demand.
///
/// Supports:
/// - Any channel count (frames stay interleaved)
/// - 8/16/24/32-bit integer and 32-bit float samples (converted to `f32`)
///
/// Seeking is positional: the container's data chunk is addressed by frame
/// index, so a fill at an arbitrary frame costs one seek plus the decode.
///
/// # Example
/// ```no_run
/// use reverse_engine::source::{FrameSource, wav::WavFrameSource};
///
/// let source = WavFrameSource::open("input.wav").unwrap();
/// println!("{} frames", source.total_frames());
/// ```
pub struct WavFrameSource<R: Read> {
    /// file name, for logs
    name: String,
    reader: WavReader<R>,
    format: AudioFormatDescriptor,
    total_frames: u64,
    /// Frame the decoder will produce next
    cursor: u64,
    /// Multiplier taking integer samples into `[-1.0, 1.0]`
    int_scale: f32,
}

impl<R: Read> fmt::Debug for WavFrameSource<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WavFrameSource")
            .field("name", &self.name)
            .field("format", &self.format)
            .field("total_frames", &self.total_frames)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl WavFrameSource<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, OpenError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_owned();
        let reader = WavReader::open(path).map_err(map_open_error)?;
        Self::from_reader(reader, name)
    }
}

impl<R: Read + Seek + Send> WavFrameSource<R> {
    pub fn from_stream(stream: R) -> Result<Self, OpenError> {
        let reader = WavReader::new(stream).map_err(map_open_error)?;
        Self::from_reader(reader, "stream".to_owned())
    }

    fn from_reader(reader: WavReader<R>, name: String) -> Result<Self, OpenError> {
        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(OpenError::Unsupported("WAV declares zero channels".to_owned()));
        }

        let int_scale = match spec.sample_format {
            hound::SampleFormat::Int if (1..=32).contains(&spec.bits_per_sample) => {
                1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32
            }
            hound::SampleFormat::Float if spec.bits_per_sample == 32 => 1.0,
            format => {
                return Err(OpenError::Unsupported(format!(
                    "{}-bit {format:?} samples",
                    spec.bits_per_sample
                )));
            }
        };

        let total_frames = u64::from(reader.duration());
        if total_frames == 0 {
            return Err(OpenError::Empty);
        }

        let format = AudioFormatDescriptor::from_wav_spec(spec);
        debug!("opened {name}: {total_frames} frames [{format}]");

        Ok(Self {
            name,
            reader,
            format,
            total_frames,
            cursor: 0,
            int_scale,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decode the whole file up front.
    pub fn into_memory(mut self) -> Result<MemoryFrameSource, DecodeError> {
        let channels = usize::from(self.format.channels);
        let frames = usize::try_from(self.total_frames)
            .map_err(|_| DecodeError::new(0, DecodeErrorKind::Unsupported))?;
        let mut samples = vec![0.0; frames * channels];
        self.fill(0, frames, &mut samples)?;
        Ok(MemoryFrameSource::from_decoded(samples, self.format))
    }

    fn decode(&mut self, destination: &mut [f32]) -> Result<usize, (usize, DecodeErrorKind)> {
        match self.format.sample_kind {
            SampleKind::Int => {
                let scale = self.int_scale;
                decode_into(self.reader.samples::<i32>(), destination, |s| {
                    s as f32 * scale
                })
            }
            SampleKind::Float => decode_into(self.reader.samples::<f32>(), destination, |s| s),
        }
    }
}

impl<R: Read + Seek + Send> FrameSource for WavFrameSource<R> {
    fn total_frames(&self) -> u64 {
        self.total_frames
    }

    fn native_format(&self) -> AudioFormatDescriptor {
        self.format
    }

    fn fill(
        &mut self,
        start_frame: u64,
        frame_count: usize,
        destination: &mut [f32],
    ) -> Result<usize, DecodeError> {
        let channels = usize::from(self.format.channels);
        let frames = clip_fill(
            self.total_frames,
            channels,
            start_frame,
            frame_count,
            destination.len(),
        );
        if frames == 0 {
            return Ok(0);
        }

        if self.cursor != start_frame {
            // duration() is a u32, so every in-range frame fits
            let target = u32::try_from(start_frame)
                .map_err(|_| DecodeError::new(0, DecodeErrorKind::Unsupported))?;
            if let Err(e) = self.reader.seek(target) {
                self.cursor = NEEDS_SEEK;
                return Err(DecodeError::new(0, DecodeErrorKind::Io(e.kind())));
            }
            self.cursor = start_frame;
        }

        let wanted = frames * channels;
        match self.decode(&mut destination[..wanted]) {
            Ok(written) if written == wanted => {
                self.cursor += frames as u64;
                Ok(frames)
            }
            Ok(written) => {
                self.cursor = NEEDS_SEEK;
                Err(DecodeError::new(
                    written / channels,
                    DecodeErrorKind::UnexpectedEof,
                ))
            }
            Err((written, kind)) => {
                self.cursor = NEEDS_SEEK;
                Err(DecodeError::new(written / channels, kind))
            }
        }
    }
}

/// Convert decoded samples into `destination` until it is full or the
/// decoder stops. On error, reports how many samples were written first.
fn decode_into<S, I>(
    samples: I,
    destination: &mut [f32],
    convert: impl Fn(S) -> f32,
) -> Result<usize, (usize, DecodeErrorKind)>
where
    I: Iterator<Item = hound::Result<S>>,
{
    let mut written = 0;
    for (slot, sample) in destination.iter_mut().zip(samples) {
        *slot = convert(sample.map_err(|e| (written, DecodeErrorKind::from(e)))?);
        written += 1;
    }
    Ok(written)
}

fn map_open_error(error: hound::Error) -> OpenError {
    match error {
        hound::Error::IoError(e) => OpenError::Io(e),
        other => OpenError::Wav(other),
    }
}
