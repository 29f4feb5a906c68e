//! Recording domain types

mod artifact;
mod buffer;
mod constraints;
mod status;

pub use artifact::{Artifact, AudioMimeType};
pub use buffer::EncodedBuffer;
pub use constraints::{SessionConstraints, CHANNEL_COUNT, DEFAULT_BIT_RATE, DEFAULT_SAMPLE_RATE};
pub use status::{RecorderStatus, SessionState};
