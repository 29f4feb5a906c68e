//! Device infrastructure module
//!
//! Provides microphone capture using cpal, plus a synthetic generator
//! source for demos and machines without audio hardware.

mod cpal;
mod synthetic;

pub use self::cpal::CpalDeviceSource;
pub use synthetic::{SyntheticDeviceSource, Waveform};
