//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod codec;
pub mod config;
pub mod device;

// Re-export common types
pub use codec::{BlockCodec, CodecError, CodecFactory};
pub use config::ConfigStore;
pub use device::{
    DeviceError, DeviceHandle, DeviceSource, DeviceStream, Quantum, QUANTA_CHANNEL_CAPACITY,
    QUANTUM_SAMPLES,
};
