//! Audio capture: a cpal input stream whose callback feeds the force bus.
//!
//! The device is asked for interleaved i16 at the configured rate, channel
//! count and buffer size. If it cannot do that, its default input config is
//! used instead, in whatever sample format it prefers.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, Device, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig,
    SupportedBufferSize,
};
use tracing::{info, warn};

use needle_core::config::AudioConfig;
use needle_core::{ForcePublisher, PcmSample};

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("no default input device")]
    NoDevice,
    #[error("no input device matching {0:?}")]
    DeviceNotFound(String),
    #[error("unsupported sample format {0:?}")]
    UnsupportedFormat(SampleFormat),
    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),
    #[error("failed to query input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build input stream: {0}")]
    Build(#[from] cpal::BuildStreamError),
    #[error("failed to start input stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
}

/// A running input stream. Capture stops when this is dropped.
pub struct Capture {
    _stream: Stream,
    description: String,
}

impl Capture {
    /// Human-readable device and format, for the footer.
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Names of all input devices on the default host.
pub fn list_input_devices() -> Result<Vec<String>, CaptureError> {
    let host = cpal::default_host();
    let names = host
        .input_devices()?
        .filter_map(|d| d.name().ok())
        .collect();
    Ok(names)
}

/// Open the configured input device and start publishing forces from it.
pub fn start(audio: &AudioConfig, publisher: ForcePublisher) -> Result<Capture, CaptureError> {
    let device = select_device(audio.device.as_deref())?;
    let name = device.name().unwrap_or_else(|_| "unknown device".to_string());

    let (config, format) = match requested_config(&device, audio) {
        Some(config) => (config, SampleFormat::I16),
        None => {
            let default = device.default_input_config()?;
            warn!(
                "{name}: {} Hz / {} ch i16 not supported, using default {:?}",
                audio.sample_rate,
                audio.channels,
                default
            );
            (default.config(), default.sample_format())
        }
    };

    let stream = match format {
        SampleFormat::I16 => build_stream::<i16>(&device, &config, publisher)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, publisher)?,
        SampleFormat::F32 => build_stream::<f32>(&device, &config, publisher)?,
        other => return Err(CaptureError::UnsupportedFormat(other)),
    };
    stream.play()?;

    let description = format!(
        "{name} · {} Hz · {} ch · {format}",
        config.sample_rate.0, config.channels
    );
    info!("capturing from {description}");

    Ok(Capture {
        _stream: stream,
        description,
    })
}

/// First input device whose name contains `wanted`, or the default one.
fn select_device(wanted: Option<&str>) -> Result<Device, CaptureError> {
    let host = cpal::default_host();
    match wanted {
        Some(wanted) => host
            .input_devices()?
            .find(|d| d.name().map(|n| n.contains(wanted)).unwrap_or(false))
            .ok_or_else(|| CaptureError::DeviceNotFound(wanted.to_string())),
        None => host.default_input_device().ok_or(CaptureError::NoDevice),
    }
}

/// The configured i16 layout, if some supported range covers it.
fn requested_config(device: &Device, audio: &AudioConfig) -> Option<StreamConfig> {
    let rate = SampleRate(audio.sample_rate);
    let range = device.supported_input_configs().ok()?.find(|r| {
        r.sample_format() == SampleFormat::I16
            && r.channels() == audio.channels
            && r.min_sample_rate() <= rate
            && rate <= r.max_sample_rate()
    })?;

    let buffer_size = match range.buffer_size() {
        SupportedBufferSize::Range { min, max }
            if (*min..=*max).contains(&audio.buffer_frames) =>
        {
            BufferSize::Fixed(audio.buffer_frames)
        }
        _ => BufferSize::Default,
    };

    Some(StreamConfig {
        channels: audio.channels,
        sample_rate: rate,
        buffer_size,
    })
}

fn build_stream<S>(
    device: &Device,
    config: &StreamConfig,
    publisher: ForcePublisher,
) -> Result<Stream, CaptureError>
where
    S: SizedSample + PcmSample + Send + 'static,
{
    let channels = config.channels as usize;
    // Stream errors are reported here; the stream itself keeps going.
    let err_fn = |err: cpal::StreamError| warn!("input stream error: {err}");

    let stream = device.build_input_stream(
        config,
        move |data: &[S], _: &cpal::InputCallbackInfo| {
            publisher.publish_block(data, channels);
        },
        err_fn,
        None,
    )?;
    Ok(stream)
}
