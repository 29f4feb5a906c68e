//! Microphone device source using cpal
//!
//! The cpal stream is not Send, so each acquisition spawns a thread that
//! owns the stream until the device handle is released. The capture
//! callback never blocks: quanta beyond the channel backlog are dropped
//! and counted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::application::ports::{
    DeviceError, DeviceHandle, DeviceSource, DeviceStream, Quantum, QUANTA_CHANNEL_CAPACITY,
    QUANTUM_SAMPLES,
};
use crate::domain::recording::SessionConstraints;

/// Microphone input source backed by the platform's default input device
#[derive(Debug, Default)]
pub struct CpalDeviceSource;

impl CpalDeviceSource {
    pub fn new() -> Self {
        Self
    }

    /// Get the default input device
    fn get_input_device() -> Result<cpal::Device, DeviceError> {
        let host = cpal::default_host();
        host.default_input_device().ok_or(DeviceError::NoDevice)
    }

    /// Find a config that satisfies the constraints exactly. The rate is
    /// never resampled; an unsupported rate is a constraint rejection.
    fn get_input_config(
        device: &cpal::Device,
        sample_rate: u32,
    ) -> Result<(StreamConfig, SampleFormat), DeviceError> {
        let supported = device
            .supported_input_configs()
            .map_err(|e| DeviceError::StreamFailed(format!("Failed to get configs: {e}")))?;

        // Prefer mono among the configs that cover the requested rate
        let mut best: Option<cpal::SupportedStreamConfigRange> = None;
        for config in supported {
            if config.sample_format() != SampleFormat::I16
                && config.sample_format() != SampleFormat::F32
            {
                continue;
            }
            if config.min_sample_rate().0 > sample_rate || config.max_sample_rate().0 < sample_rate
            {
                continue;
            }

            let is_better = match &best {
                None => true,
                Some(current) => config.channels() < current.channels(),
            };
            if is_better {
                best = Some(config);
            }
        }

        let range = best.ok_or_else(|| {
            DeviceError::ConstraintsRejected(format!("no input config supports {sample_rate} Hz"))
        })?;

        let sample_format = range.sample_format();
        let config = StreamConfig {
            channels: range.channels(),
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        Ok((config, sample_format))
    }

    /// Mix interleaved frames down to mono
    fn mix_to_mono(data: &[f32], channels: u16) -> Vec<f32> {
        if channels == 1 {
            return data.to_vec();
        }
        data.chunks(channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }
}

#[async_trait]
impl DeviceSource for CpalDeviceSource {
    async fn acquire(&self, constraints: &SessionConstraints) -> Result<DeviceStream, DeviceError> {
        let sample_rate = constraints.sample_rate();
        let (quanta_tx, quanta_rx) = mpsc::channel(QUANTA_CHANNEL_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = oneshot::channel();

        let thread_stop = Arc::clone(&stop);
        std::thread::spawn(move || capture_thread(sample_rate, quanta_tx, thread_stop, ready_tx));

        match ready_rx.await {
            Ok(Ok(())) => Ok(DeviceStream::new(quanta_rx, DeviceHandle::new(stop))),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DeviceError::StreamFailed(
                "capture thread exited during setup".to_string(),
            )),
        }
    }
}

/// Owns the cpal stream for the lifetime of one acquisition
fn capture_thread(
    sample_rate: u32,
    tx: mpsc::Sender<Quantum>,
    stop: Arc<AtomicBool>,
    ready: oneshot::Sender<Result<(), DeviceError>>,
) {
    let stream = match build_stream(sample_rate, tx) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(DeviceError::StreamFailed(e.to_string())));
        return;
    }
    let _ = ready.send(Ok(()));

    // Keep the stream alive until released
    while !stop.load(Ordering::SeqCst) {
        std::thread::sleep(std::time::Duration::from_millis(50));
    }
    drop(stream);
    debug!("capture thread stopped");
}

fn build_stream(sample_rate: u32, tx: mpsc::Sender<Quantum>) -> Result<cpal::Stream, DeviceError> {
    let device = CpalDeviceSource::get_input_device()?;
    let (config, sample_format) = CpalDeviceSource::get_input_config(&device, sample_rate)?;
    let channels = config.channels;
    let err_fn = |err| warn!("audio stream error: {err}");

    let stream = match sample_format {
        SampleFormat::F32 => {
            let mut slicer = QuantumSlicer::new(tx);
            device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    slicer.push(&CpalDeviceSource::mix_to_mono(data, channels));
                },
                err_fn,
                None,
            )
        }

        SampleFormat::I16 => {
            let mut slicer = QuantumSlicer::new(tx);
            device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let floats: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                    slicer.push(&CpalDeviceSource::mix_to_mono(&floats, channels));
                },
                err_fn,
                None,
            )
        }

        _ => {
            return Err(DeviceError::ConstraintsRejected(
                "unsupported sample format".to_string(),
            ))
        }
    };

    stream.map_err(|e| DeviceError::StreamFailed(e.to_string()))
}

/// Slices the incoming sample flow into fixed-size quanta and delivers
/// them without blocking the capture callback.
struct QuantumSlicer {
    tx: mpsc::Sender<Quantum>,
    residue: Vec<f32>,
    dropped: u64,
}

impl QuantumSlicer {
    fn new(tx: mpsc::Sender<Quantum>) -> Self {
        Self {
            tx,
            residue: Vec::with_capacity(QUANTUM_SAMPLES * 4),
            dropped: 0,
        }
    }

    fn push(&mut self, samples: &[f32]) {
        self.residue.extend_from_slice(samples);
        while self.residue.len() >= QUANTUM_SAMPLES {
            let quantum: Quantum = self.residue.drain(..QUANTUM_SAMPLES).collect();
            if self.tx.try_send(quantum).is_err() {
                self.dropped += 1;
                if self.dropped % 256 == 1 {
                    warn!(dropped = self.dropped, "quanta backlog full, dropping input");
                }
            }
        }
    }
}
