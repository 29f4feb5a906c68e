//! Compression primitive port interface

use thiserror::Error;

use crate::domain::recording::{AudioMimeType, SessionConstraints};

/// Codec errors
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    #[error("Failed to construct encoder: {0}")]
    Construction(String),

    #[error("Block encoding failed: {0}")]
    Encode(String),

    #[error("Failed to finalize encoded stream: {0}")]
    Flush(String),
}

/// Port for the underlying bitstream encoder.
///
/// The primitive consumes 16-bit mono samples in blocks of at most
/// [`block_size`](BlockCodec::block_size) and returns opaque compressed
/// chunks. A returned chunk may be empty while the primitive buffers
/// samples internally. `flush` finalizes the stream and returns the
/// trailing chunk; the primitive accepts no further blocks afterwards.
pub trait BlockCodec: Send {
    /// Required input block size in samples.
    fn block_size(&self) -> usize;

    /// Feed one full or partial block of samples.
    fn encode_block(&mut self, samples: &[i16]) -> Result<Vec<u8>, CodecError>;

    /// Finalize the stream. One-way: the codec is spent afterwards.
    fn flush(&mut self) -> Result<Vec<u8>, CodecError>;

    /// MIME type of the produced stream.
    fn mime_type(&self) -> AudioMimeType;
}

/// Factory for per-session codec instances.
pub trait CodecFactory: Send + Sync {
    fn create(&self, constraints: &SessionConstraints) -> Result<Box<dyn BlockCodec>, CodecError>;

    /// MIME type of streams produced by this factory's codecs.
    fn mime_type(&self) -> AudioMimeType {
        AudioMimeType::default()
    }
}
