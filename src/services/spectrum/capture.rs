//! Capture engine: drives loopback capture on a dedicated thread and emits
//! normalized band vectors at the refresh rate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error, info};

use crate::services::common::Property;

use super::analyzer;
use super::error::SpectrumError;
use super::source::{LoopbackSource, Packet, PacketSamples, PacketSource};
use super::types::{BAND_COUNT, FrequencyBandConfig, REFRESH_RATE, silence_bands};

const BANDS_CHANNEL_CAPACITY: usize = 16;

/// Audio spectrum capture engine.
///
/// Owns a worker thread that pulls loopback packets, downmixes them to mono,
/// maintains a rolling sample window and broadcasts one 64-band vector per
/// tick. The audio stream is not `Send`, so it lives entirely on the worker.
pub struct CaptureEngine {
    /// Current analysis parameters; the worker reads these every tick.
    pub config: Property<FrequencyBandConfig>,
    bands_tx: broadcast::Sender<Vec<f32>>,
    running: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Default for CaptureEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureEngine {
    /// Create an engine with default band configuration. No audio is touched
    /// until [`CaptureEngine::start`].
    pub fn new() -> Self {
        let (bands_tx, _) = broadcast::channel(BANDS_CHANNEL_CAPACITY);
        Self {
            config: Property::new(FrequencyBandConfig::default()),
            bands_tx,
            running: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Subscribe to emitted band vectors.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<f32>> {
        self.bands_tx.subscribe()
    }

    /// Stream of band vectors; lagged subscribers skip to the freshest frame.
    pub fn bands_stream(&self) -> impl Stream<Item = Vec<f32>> + Send + use<> {
        BroadcastStream::new(self.bands_tx.subscribe()).filter_map(|frame| async { frame.ok() })
    }

    /// Replace the analysis configuration after validating it.
    ///
    /// Takes effect from the next tick; the in-flight window is not resized.
    ///
    /// # Errors
    ///
    /// Returns [`SpectrumError::InvalidConfiguration`] for a rejected
    /// configuration; the previous one stays in force.
    pub fn update_config(
        &self,
        fft_size: usize,
        freq_min: f32,
        freq_max: f32,
    ) -> Result<(), SpectrumError> {
        let config = FrequencyBandConfig::new(fft_size, freq_min, freq_max)?;
        self.config.set(config);
        Ok(())
    }

    /// Start the capture worker.
    ///
    /// Device acquisition happens on the worker; a failure to open the
    /// loopback stream is logged and the engine returns to idle rather than
    /// retrying.
    ///
    /// # Errors
    ///
    /// Returns [`SpectrumError::AlreadyRunning`] when the worker is active.
    pub fn start(&mut self) -> Result<(), SpectrumError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SpectrumError::AlreadyRunning);
        }
        self.stop.store(false, Ordering::SeqCst);

        let bands_tx = self.bands_tx.clone();
        let config = self.config.clone();
        let running = Arc::clone(&self.running);
        let stop = Arc::clone(&self.stop);

        let worker = thread::Builder::new()
            .name("soundring-capture".to_string())
            .spawn(move || {
                let source = match LoopbackSource::open() {
                    Ok(source) => source,
                    Err(e) => {
                        error!(error = %e, "loopback capture unavailable");
                        running.store(false, Ordering::SeqCst);
                        return;
                    }
                };
                info!(sample_rate = source.sample_rate(), "capture started");
                run_capture_loop(source, &config, &bands_tx, &stop);
                running.store(false, Ordering::SeqCst);
                info!("capture stopped");
            })
            .map_err(|e| SpectrumError::DeviceUnavailable(e.to_string()));

        match worker {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Stop the capture worker and wait for it to exit. No-op when idle.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                debug!("capture worker panicked during shutdown");
            }
        }
    }

    /// Whether the worker thread is currently capturing.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for CaptureEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Per-tick analysis state: the rolling mono window.
struct TickState {
    rolling: Vec<f32>,
}

impl TickState {
    fn new() -> Self {
        Self {
            rolling: Vec::new(),
        }
    }

    /// Consume pending packets and produce this tick's band vector.
    ///
    /// `None` means the window has not filled yet and nothing should be
    /// emitted. Silence (no pending packets, or only silent ones) yields the
    /// floor vector immediately.
    fn tick<S: PacketSource>(
        &mut self,
        source: &mut S,
        config: &FrequencyBandConfig,
    ) -> Option<Vec<f32>> {
        if source.pending() == 0 {
            return Some(silence_bands());
        }

        let mut appended = 0usize;
        while let Some(packet) = source.next_packet() {
            if packet.silent {
                continue;
            }
            let mono = downmix(&packet);
            appended += mono.len();
            self.rolling.extend(mono);
        }
        if appended == 0 {
            return Some(silence_bands());
        }

        if self.rolling.len() >= config.fft_size {
            let window_start = self.rolling.len() - config.fft_size;
            let bands = analyzer::process_block(
                &self.rolling[window_start..],
                source.sample_rate(),
                config,
                BAND_COUNT,
            );
            self.rolling.drain(..appended.min(self.rolling.len()));
            let cap = config.fft_size * 2;
            if self.rolling.len() > cap {
                let excess = self.rolling.len() - cap;
                self.rolling.drain(..excess);
            }
            return Some(bands);
        }
        None
    }
}

fn run_capture_loop<S: PacketSource>(
    mut source: S,
    config: &Property<FrequencyBandConfig>,
    bands_tx: &broadcast::Sender<Vec<f32>>,
    stop: &AtomicBool,
) {
    let tick = Duration::from_secs(1) / REFRESH_RATE;
    let mut state = TickState::new();
    let mut next_tick = Instant::now() + tick;

    while !stop.load(Ordering::SeqCst) {
        let current = config.get();
        if let Some(bands) = state.tick(&mut source, &current) {
            // Errors just mean nobody is listening right now.
            let _ = bands_tx.send(bands);
        }

        let now = Instant::now();
        if next_tick > now {
            thread::sleep(next_tick - now);
        }
        next_tick += tick;
        // After a long stall, realign rather than burst-firing catch-up ticks.
        if next_tick < Instant::now() {
            next_tick = Instant::now() + tick;
        }
    }
}

/// Downmix an interleaved packet to mono f32 in [-1, 1].
fn downmix(packet: &Packet) -> Vec<f32> {
    let channels = packet.channels.max(1) as usize;
    match &packet.samples {
        PacketSamples::F32(samples) => samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect(),
        PacketSamples::I16(samples) => samples
            .chunks_exact(channels)
            .map(|frame| {
                frame.iter().map(|&s| f32::from(s) / 32_768.0).sum::<f32>() / channels as f32
            })
            .collect(),
    }
}
