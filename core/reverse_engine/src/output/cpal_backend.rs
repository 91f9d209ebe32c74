use cpal::{
    BufferSize, Device, FromSample, OutputCallbackInfo, SampleFormat, SampleRate, SizedSample,
    StreamConfig,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use log::{debug, error, info, warn};

use super::{AudioBackend, Renderer};
use crate::{config::OutputConfig, error::AudioDeviceError};

/// Hardware output through the platform's default `cpal` host.
pub struct CpalBackend {
    host: cpal::Host,
    stream: Option<cpal::Stream>,
}

impl std::fmt::Debug for CpalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalBackend")
            .field("host", &self.host.id())
            .field("stream_open", &self.stream.is_some())
            .finish()
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
            stream: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Names of the output devices the host can see.
    pub fn output_device_names(&self) -> Result<Vec<String>, AudioDeviceError> {
        let devices = self
            .host
            .output_devices()
            .map_err(|e| AudioDeviceError::StreamBuildFailed(e.to_string()))?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    fn select_device(&self, name: Option<&str>) -> Result<Device, AudioDeviceError> {
        let Some(name) = name else {
            return self
                .host
                .default_output_device()
                .ok_or(AudioDeviceError::DeviceNotFound);
        };
        self.host
            .output_devices()
            .map_err(|e| AudioDeviceError::StreamBuildFailed(e.to_string()))?
            .find(|d| d.name().is_ok_and(|n| n == name))
            .ok_or(AudioDeviceError::DeviceNotFound)
    }

    /// Prefer a float config at the requested rate and channel count, then
    /// any sample format at that rate, then the device default.
    fn pick_config(
        device: &Device,
        config: &OutputConfig,
    ) -> Result<(StreamConfig, SampleFormat), AudioDeviceError> {
        let rate = config.sample_rate;
        let supported: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| AudioDeviceError::StreamBuildFailed(e.to_string()))?
            .filter(|c| {
                c.channels() == config.channels
                    && c.min_sample_rate().0 <= rate
                    && c.max_sample_rate().0 >= rate
            })
            .collect();

        let preferred = supported
            .iter()
            .find(|c| c.sample_format() == SampleFormat::F32)
            .or_else(|| supported.first());

        let (mut stream_config, sample_format) = if let Some(c) = preferred {
            let c = c.clone().with_sample_rate(SampleRate(rate));
            (c.config(), c.sample_format())
        } else {
            let c = device
                .default_output_config()
                .map_err(|e| AudioDeviceError::StreamBuildFailed(e.to_string()))?;
            warn!(
                "no device config for {rate} Hz / {} ch, falling back to {} Hz / {} ch",
                config.channels,
                c.sample_rate().0,
                c.channels()
            );
            (c.config(), c.sample_format())
        };

        if let Some(frames) = config.hardware_buffer_frames {
            stream_config.buffer_size = BufferSize::Fixed(frames);
        }
        Ok((stream_config, sample_format))
    }

    fn build_output_stream<T>(
        device: &Device,
        config: &StreamConfig,
        mut renderer: Renderer,
    ) -> Result<cpal::Stream, AudioDeviceError>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = usize::from(config.channels);
        let data_cb = move |data: &mut [T], _: &OutputCallbackInfo| {
            renderer.render(data, channels);
        };
        let error_cb = |err: cpal::StreamError| {
            error!("output stream error: {err}");
        };

        device
            .build_output_stream(config, data_cb, error_cb, None)
            .map_err(|e| AudioDeviceError::StreamBuildFailed(e.to_string()))
    }
}

impl AudioBackend for CpalBackend {
    fn open_stream(
        &mut self,
        renderer: Renderer,
        config: &OutputConfig,
    ) -> Result<(), AudioDeviceError> {
        self.close_stream();

        let device = self.select_device(config.device_name.as_deref())?;
        let (stream_config, sample_format) = Self::pick_config(&device, config)?;
        info!(
            "opening output on '{}': {} Hz, {} ch, {sample_format}, buffer {:?}",
            device.name().unwrap_or_default(),
            stream_config.sample_rate.0,
            stream_config.channels,
            stream_config.buffer_size
        );

        let stream = match sample_format {
            SampleFormat::F32 => {
                Self::build_output_stream::<f32>(&device, &stream_config, renderer)?
            }
            SampleFormat::I16 => {
                Self::build_output_stream::<i16>(&device, &stream_config, renderer)?
            }
            SampleFormat::U16 => {
                Self::build_output_stream::<u16>(&device, &stream_config, renderer)?
            }
            format => {
                return Err(AudioDeviceError::StreamBuildFailed(format!(
                    "unsupported sample format '{format}'"
                )));
            }
        };

        stream
            .play()
            .map_err(|e| AudioDeviceError::StreamStartFailed(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn close_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                debug!("pausing output stream on close: {e}");
            }
        }
    }
}
