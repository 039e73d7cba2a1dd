//! Audio packet sources feeding the capture loop.
//!
//! The capture loop is written against [`PacketSource`] so the analysis
//! pipeline can be driven by canned packets in tests; [`LoopbackSource`] is
//! the production implementation on top of cpal.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use tracing::{debug, info, warn};

use super::error::SpectrumError;

/// Raw samples of one capture callback, in the device's native format.
#[derive(Debug, Clone)]
pub enum PacketSamples {
    /// Signed 16-bit PCM
    I16(Vec<i16>),
    /// 32-bit float PCM
    F32(Vec<f32>),
}

/// One capture callback's worth of interleaved audio.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Interleaved samples
    pub samples: PacketSamples,
    /// Interleaved channel count
    pub channels: u16,
    /// True when every sample in the packet is zero
    pub silent: bool,
}

/// Source of audio packets for the capture loop.
pub trait PacketSource {
    /// Sample rate of the produced packets, Hz.
    fn sample_rate(&self) -> u32;

    /// Number of packets ready to be consumed without blocking.
    fn pending(&self) -> usize;

    /// Pop the oldest pending packet, if any.
    fn next_packet(&mut self) -> Option<Packet>;
}

type PacketQueue = Arc<Mutex<VecDeque<Packet>>>;

/// Bound on buffered packets between ticks. At 60 ticks per second the queue
/// never grows anywhere near this unless the consumer has stalled.
const QUEUE_CAPACITY: usize = 256;

/// System loopback capture via cpal.
///
/// Holds the live stream; dropping the source stops capture.
pub struct LoopbackSource {
    queue: PacketQueue,
    sample_rate: u32,
    _stream: Stream,
}

impl LoopbackSource {
    /// Open a loopback capture stream on the best available device.
    ///
    /// Device preference order: the default output device when it exposes an
    /// input configuration (native loopback), then an input device whose name
    /// contains "monitor", then the default input device.
    ///
    /// # Errors
    ///
    /// Returns [`SpectrumError::DeviceUnavailable`] when no capturable device
    /// exists or the stream cannot be built in a supported sample format.
    pub fn open() -> Result<Self, SpectrumError> {
        let host = cpal::default_host();
        let device = select_device(&host)?;
        let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());

        let supported = device
            .default_input_config()
            .map_err(|e| SpectrumError::DeviceUnavailable(format!("{name}: {e}")))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let sample_rate = config.sample_rate.0;
        let channels = config.channels;

        info!(device = %name, sample_rate, channels, "opening loopback capture");

        let queue: PacketQueue = Arc::new(Mutex::new(VecDeque::new()));
        let stream = build_stream(&device, &config, sample_format, channels, Arc::clone(&queue))?;
        stream
            .play()
            .map_err(|e| SpectrumError::DeviceUnavailable(format!("{name}: {e}")))?;

        Ok(Self {
            queue,
            sample_rate,
            _stream: stream,
        })
    }
}

impl PacketSource for LoopbackSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn pending(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    fn next_packet(&mut self) -> Option<Packet> {
        self.queue.lock().ok()?.pop_front()
    }
}

fn select_device(host: &cpal::Host) -> Result<Device, SpectrumError> {
    if let Some(output) = host.default_output_device() {
        if output.default_input_config().is_ok() {
            debug!("using default output device as loopback source");
            return Ok(output);
        }
    }

    if let Ok(inputs) = host.input_devices() {
        for device in inputs {
            let name = device.name().unwrap_or_default();
            if name.to_lowercase().contains("monitor") {
                debug!(device = %name, "using monitor input as loopback source");
                return Ok(device);
            }
        }
    }

    host.default_input_device().ok_or_else(|| {
        SpectrumError::DeviceUnavailable("no loopback-capable audio device found".to_string())
    })
}

fn build_stream(
    device: &Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    channels: u16,
    queue: PacketQueue,
) -> Result<Stream, SpectrumError> {
    let on_error = |e: cpal::StreamError| warn!(error = %e, "capture stream error");

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let silent = data.iter().all(|&s| s == 0.0);
                push_packet(
                    &queue,
                    Packet {
                        samples: PacketSamples::F32(data.to_vec()),
                        channels,
                        silent,
                    },
                );
            },
            on_error,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let silent = data.iter().all(|&s| s == 0);
                push_packet(
                    &queue,
                    Packet {
                        samples: PacketSamples::I16(data.to_vec()),
                        channels,
                        silent,
                    },
                );
            },
            on_error,
            None,
        ),
        other => {
            return Err(SpectrumError::DeviceUnavailable(format!(
                "unsupported sample format {other}"
            )));
        }
    };

    stream.map_err(|e| SpectrumError::DeviceUnavailable(e.to_string()))
}

fn push_packet(queue: &PacketQueue, packet: Packet) {
    if let Ok(mut q) = queue.lock() {
        if q.len() >= QUEUE_CAPACITY {
            q.pop_front();
        }
        q.push_back(packet);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn queue_drops_oldest_when_full() {
        let queue: PacketQueue = Arc::new(Mutex::new(VecDeque::new()));
        for i in 0..(QUEUE_CAPACITY + 10) {
            push_packet(
                &queue,
                Packet {
                    samples: PacketSamples::F32(vec![i as f32]),
                    channels: 1,
                    silent: false,
                },
            );
        }
        let q = queue.lock().unwrap();
        assert_eq!(q.len(), QUEUE_CAPACITY);
        match &q.front().unwrap().samples {
            PacketSamples::F32(v) => assert_eq!(v[0], 10.0),
            PacketSamples::I16(_) => panic!("wrong format"),
        }
    }
}
