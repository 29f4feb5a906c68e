//! Synthetic device source
//!
//! Generates quanta at the real-time rate without touching any hardware.
//! Useful for demos on machines without a microphone and for exercising
//! the pipeline end to end.

use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::application::ports::{
    DeviceError, DeviceHandle, DeviceSource, DeviceStream, Quantum, QUANTA_CHANNEL_CAPACITY,
    QUANTUM_SAMPLES,
};
use crate::domain::recording::SessionConstraints;

#[derive(Debug, Clone, Copy)]
pub enum Waveform {
    Silence,
    Sine { frequency: f32 },
}

/// Device source producing a fixed waveform, paced like a live device
#[derive(Debug, Clone, Copy)]
pub struct SyntheticDeviceSource {
    waveform: Waveform,
}

impl SyntheticDeviceSource {
    pub fn silence() -> Self {
        Self {
            waveform: Waveform::Silence,
        }
    }

    pub fn sine(frequency: f32) -> Self {
        Self {
            waveform: Waveform::Sine { frequency },
        }
    }
}

#[async_trait]
impl DeviceSource for SyntheticDeviceSource {
    async fn acquire(&self, constraints: &SessionConstraints) -> Result<DeviceStream, DeviceError> {
        let (tx, rx) = mpsc::channel(QUANTA_CHANNEL_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));
        let sample_rate = constraints.sample_rate();
        let waveform = self.waveform;

        let task_stop = Arc::clone(&stop);
        tokio::spawn(async move {
            let period = Duration::from_secs_f64(QUANTUM_SAMPLES as f64 / sample_rate as f64);
            let mut ticker = tokio::time::interval(period);
            let mut position: u64 = 0;

            while !task_stop.load(Ordering::SeqCst) {
                ticker.tick().await;
                let quantum = generate(waveform, sample_rate, position);
                position += QUANTUM_SAMPLES as u64;
                if tx.send(quantum).await.is_err() {
                    break;
                }
            }
            debug!("synthetic source stopped");
        });

        Ok(DeviceStream::new(rx, DeviceHandle::new(stop)))
    }
}

fn generate(waveform: Waveform, sample_rate: u32, position: u64) -> Quantum {
    match waveform {
        Waveform::Silence => vec![0.0; QUANTUM_SAMPLES],
        Waveform::Sine { frequency } => (0..QUANTUM_SAMPLES)
            .map(|i| {
                let t = (position + i as u64) as f32 / sample_rate as f32;
                (2.0 * PI * frequency * t).sin() * 0.4
            })
            .collect(),
    }
}
