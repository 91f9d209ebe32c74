use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};
use reverse_engine::{
    Output, OutputConfig, Reader, ReaderConfig, ReaderControl,
    diagnostics::DiagnosticsDrain,
    output::ManualBackend,
    source::{FrameSource, memory::MemoryFrameSource, wav::WavFrameSource},
};

pub const TEST_RATE: u32 = 44100;

/// Mono source whose frame `i` holds the value `i`.
pub fn mono_ramp(frames: usize) -> MemoryFrameSource {
    MemoryFrameSource::new((0..frames).map(|i| i as f32).collect(), TEST_RATE, 1).unwrap()
}

/// 16-bit stereo WAV whose left channel at frame `i` is `i`, right is `-i`.
pub fn stereo_wav(frames: i16) -> Cursor<Vec<u8>> {
    let spec = WavSpec {
        channels: 2,
        sample_rate: TEST_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut buffer = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut buffer, spec).unwrap();
    for i in 0..frames {
        writer.write_sample(i).unwrap();
        writer.write_sample(-i).unwrap();
    }
    writer.finalize().unwrap();
    buffer.set_position(0);
    buffer
}

pub fn small_chunks() -> ReaderConfig {
    ReaderConfig {
        chunk_frames: 64,
        lookahead_depth: 3,
    }
}

pub struct Rig {
    pub output: Output<ManualBackend>,
    pub backend: ManualBackend,
    pub control: ReaderControl,
    pub diagnostics: DiagnosticsDrain,
}

/// Wire `source` through a reader into a manually ticked output.
pub fn rig<S: FrameSource + 'static>(source: S, config: ReaderConfig) -> Rig {
    let client = source.native_format().client_format();
    let (reader, control, diagnostics) = Reader::open(source, client, config).unwrap();

    let backend = ManualBackend::new();
    let mut output = Output::new(backend.clone(), OutputConfig::for_format(&client));
    output.set_data_source(Box::new(reader)).unwrap();

    Rig {
        output,
        backend,
        control,
        diagnostics,
    }
}

pub fn wav_rig(frames: i16) -> Rig {
    rig(WavFrameSource::from_stream(stereo_wav(frames)).unwrap(), small_chunks())
}

/// Left-channel values of a stereo tick, scaled back to the integers written.
pub fn left_as_ints(samples: &[f32]) -> Vec<i32> {
    samples
        .chunks_exact(2)
        .map(|frame| (frame[0] * 32768.0).round() as i32)
        .collect()
}
