//! Application layer - Use cases and port interfaces
//!
//! Contains the core recording operations and trait definitions
//! for external system interactions.

pub mod encoder;
pub mod ports;
pub mod recorder;
pub mod worker;

// Re-export use cases
pub use encoder::SessionEncoder;
pub use recorder::{AudioRecorderService, ClearOptions, RecorderError, ACK_TIMEOUT};
pub use worker::{ProcessingWorker, WorkerCommand, WorkerEvent, WorkerHandle};
