use std::{
    error::Error,
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use clap::Parser;
use log::info;
use reverse_engine::{
    Direction, Output, OutputConfig, Reader, ReaderConfig,
    constants::{DEFAULT_CHUNK_FRAMES, DEFAULT_LOOKAHEAD_DEPTH},
    output::CpalBackend,
};

/// Play a WAV file forwards or backwards on the default output device.
#[derive(Debug, Parser)]
#[command(name = "reverse-player", version)]
struct Args {
    /// WAV file to play
    path: PathBuf,

    /// Play backwards from the end of the window
    #[arg(short, long, env = "REVERSE_PLAYER_REVERSE")]
    reverse: bool,

    /// Starting point as a fraction of the file, 0.0 to 1.0
    #[arg(long, value_name = "FRACTION")]
    start_fraction: Option<f64>,

    /// First frame of the playback window
    #[arg(long, value_name = "FRAME")]
    window_start: Option<i64>,

    /// Frame just past the end of the playback window
    #[arg(long, value_name = "FRAME")]
    window_end: Option<i64>,

    /// Hardware buffer size in frames
    #[arg(long, env = "REVERSE_PLAYER_BUFFER_FRAMES")]
    buffer_frames: Option<u32>,

    /// Frames decoded per reversal chunk
    #[arg(long, env = "REVERSE_PLAYER_CHUNK_FRAMES", default_value_t = DEFAULT_CHUNK_FRAMES)]
    chunk_frames: usize,

    /// Reversal chunks kept staged around the cursor
    #[arg(long, env = "REVERSE_PLAYER_LOOKAHEAD", default_value_t = DEFAULT_LOOKAHEAD_DEPTH)]
    lookahead: usize,

    /// Output device name; the default device when omitted
    #[arg(long, env = "REVERSE_PLAYER_DEVICE")]
    device: Option<String>,

    /// Stop after this many seconds even if the window edge is not reached
    #[arg(long)]
    seconds: Option<f64>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = ReaderConfig {
        chunk_frames: args.chunk_frames,
        lookahead_depth: args.lookahead,
    };
    let (reader, mut control, mut diagnostics) = Reader::open_wav(&args.path, config)?;

    if args.window_start.is_some() || args.window_end.is_some() {
        let total = control.total_frames().try_into().unwrap_or(i64::MAX);
        control.set_window(args.window_start.unwrap_or(0), args.window_end.unwrap_or(total));
    }
    let direction = if args.reverse {
        Direction::Reverse
    } else {
        Direction::Forward
    };
    control.set_direction(direction);
    match args.start_fraction {
        Some(fraction) => {
            control.seek_fraction(fraction);
        }
        None => {
            control.seek(control.window().boundary(direction.flipped()));
        }
    }

    let mut output_config = OutputConfig::for_format(&control.client_format());
    output_config.hardware_buffer_frames = args.buffer_frames;
    if let Some(frames) = args.buffer_frames {
        output_config.max_pull_frames = output_config.max_pull_frames.max(frames as usize);
    }
    output_config.device_name = args.device;

    let mut output = Output::new(CpalBackend::new(), output_config);
    output.set_data_source(Box::new(reader))?;
    output.start_output_unit()?;

    let deadline = args.seconds.map(|s| Instant::now() + Duration::from_secs_f64(s.max(0.0)));
    loop {
        thread::sleep(Duration::from_millis(50));
        diagnostics.drain_and_log();
        if control.at_boundary() || deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
    }

    output.stop_output_unit();
    diagnostics.drain_and_log();
    info!(
        "stopped at frame {} of {}",
        control.position(),
        control.total_frames()
    );
    Ok(())
}
