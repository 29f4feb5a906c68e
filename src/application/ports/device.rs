//! Device acquisition port interface

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::recording::SessionConstraints;

/// Samples delivered per real-time invocation
pub const QUANTUM_SAMPLES: usize = 128;

/// Capacity of the quanta channel between a device and its consumer.
/// The producer never blocks; quanta beyond this backlog are dropped.
pub const QUANTA_CHANNEL_CAPACITY: usize = 256;

/// One fixed-size block of mono float samples
pub type Quantum = Vec<f32>;

/// Device acquisition errors
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    #[error("No audio input device available")]
    NoDevice,

    #[error("Device rejected constraints: {0}")]
    ConstraintsRejected(String),

    #[error("Failed to start input stream: {0}")]
    StreamFailed(String),
}

/// Handle controlling a live device stream. Releasing it (explicitly or
/// by drop) stops capture and frees the device.
#[derive(Debug)]
pub struct DeviceHandle {
    stop: Arc<AtomicBool>,
}

impl DeviceHandle {
    pub fn new(stop: Arc<AtomicBool>) -> Self {
        Self { stop }
    }

    pub fn release(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_released(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// A live input stream: a bounded sequence of quanta plus the handle that
/// releases the underlying device.
#[derive(Debug)]
pub struct DeviceStream {
    quanta: mpsc::Receiver<Quantum>,
    handle: DeviceHandle,
}

impl DeviceStream {
    pub fn new(quanta: mpsc::Receiver<Quantum>, handle: DeviceHandle) -> Self {
        Self { quanta, handle }
    }

    /// Split into the quanta receiver (for the processing side) and the
    /// device handle (kept by the control side).
    pub fn split(self) -> (mpsc::Receiver<Quantum>, DeviceHandle) {
        (self.quanta, self.handle)
    }
}

/// Port for acquiring a live sample stream from an input device.
#[async_trait]
pub trait DeviceSource: Send + Sync {
    /// Acquire the device under the given constraints.
    ///
    /// Fails with [`DeviceError`] when the device is unavailable or the
    /// constraints cannot be satisfied; the caller decides whether to
    /// surface or retry.
    async fn acquire(&self, constraints: &SessionConstraints) -> Result<DeviceStream, DeviceError>;
}
