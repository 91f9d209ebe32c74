use std::fmt;

use crate::error::FormatError;

/// Numeric representation of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    Int,
    Float,
}

/// Describes a stream of audio frames: the file's native layout or the
/// layout a client asks the reader to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormatDescriptor {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub sample_kind: SampleKind,
    pub interleaved: bool,
    /// `false` for compressed payloads that need a codec before reading.
    pub is_pcm: bool,
}

impl AudioFormatDescriptor {
    /// The only client layout the reader delivers: interleaved `f32`.
    pub const fn float32_interleaved(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample: 32,
            sample_kind: SampleKind::Float,
            interleaved: true,
            is_pcm: true,
        }
    }

    pub fn from_wav_spec(spec: hound::WavSpec) -> Self {
        Self {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
            sample_kind: match spec.sample_format {
                hound::SampleFormat::Int => SampleKind::Int,
                hound::SampleFormat::Float => SampleKind::Float,
            },
            interleaved: true,
            is_pcm: true,
        }
    }

    pub fn bytes_per_frame(&self) -> u32 {
        u32::from(self.bits_per_sample).div_ceil(8) * u32::from(self.channels)
    }

    /// Same rate and channel count, decoded to interleaved `f32`.
    pub fn client_format(&self) -> Self {
        Self::float32_interleaved(self.sample_rate, self.channels)
    }

    /// Check that frames in `self` (the file format) can be delivered as
    /// `client` without a conversion stage.
    pub fn negotiate(&self, client: &Self) -> Result<(), FormatError> {
        if !self.is_pcm {
            return Err(FormatError::Unsupported(format!(
                "file format is not PCM [{self}]"
            )));
        }
        if self.channels == 0 || client.channels == 0 {
            return Err(FormatError::Unsupported("zero channels".to_owned()));
        }
        if !client.is_pcm
            || !client.interleaved
            || client.sample_kind != SampleKind::Float
            || client.bits_per_sample != 32
        {
            return Err(FormatError::Unsupported(format!(
                "client format must be interleaved 32-bit float PCM, got [{client}]"
            )));
        }
        if self.sample_rate != client.sample_rate || self.channels != client.channels {
            return Err(FormatError::Mismatch {
                file: *self,
                client: *client,
            });
        }
        Ok(())
    }
}

impl fmt::Display for AudioFormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.sample_kind {
            SampleKind::Int => "int",
            SampleKind::Float => "float",
        };
        let layout = if self.interleaved {
            "interleaved"
        } else {
            "non-interleaved"
        };
        let payload = if self.is_pcm { "pcm" } else { "compressed" };
        write!(
            f,
            "{} Hz, {} ch, {}-bit {kind}, {layout}, {payload}, {} bytes/frame",
            self.sample_rate,
            self.channels,
            self.bits_per_sample,
            self.bytes_per_frame()
        )
    }
}
