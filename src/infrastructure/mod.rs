//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces,
//! integrating with the platform audio stack and the filesystem.

pub mod codec;
pub mod config;
pub mod device;

// Re-export adapters
pub use codec::{OggOpusCodec, OggOpusFactory};
pub use config::XdgConfigStore;
pub use device::{CpalDeviceSource, SyntheticDeviceSource};
