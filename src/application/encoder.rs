//! Session encoder: drives the compression primitive for one session
//!
//! Converts float quanta to 16-bit PCM, groups them into the primitive's
//! block size, and accumulates the compressed output. One instance per
//! physical encode session; pause/resume swaps instances and threads the
//! committed buffer through as a seed.

use crate::application::ports::{BlockCodec, CodecError};
use crate::domain::recording::{AudioMimeType, EncodedBuffer};

/// Stateful wrapper around one codec instance.
pub struct SessionEncoder {
    codec: Box<dyn BlockCodec>,
    committed: EncodedBuffer,
}

impl SessionEncoder {
    /// Wrap a codec, optionally seeding the committed buffer with chunks
    /// carried over from a previous session so the combined output stays
    /// contiguous.
    pub fn new(codec: Box<dyn BlockCodec>, carry_over: Option<EncodedBuffer>) -> Self {
        Self {
            codec,
            committed: carry_over.unwrap_or_default(),
        }
    }

    /// Consume one quantum of float samples.
    ///
    /// Every delivered quantum is fed through; the source does not wait,
    /// so nothing may be dropped or deferred here.
    pub fn encode(&mut self, samples: &[f32]) -> Result<(), CodecError> {
        let pcm = convert_to_pcm(samples);
        for block in pcm.chunks(self.codec.block_size()) {
            let chunk = self.codec.encode_block(block)?;
            self.committed.push(chunk);
        }
        Ok(())
    }

    /// Deep copy of the committed buffer. Taken at a pause point this
    /// excludes the flush-only trailing chunk, which keeps the copy
    /// usable as a seed for a resumed session.
    pub fn snapshot(&self) -> EncodedBuffer {
        self.committed.snapshot()
    }

    /// Finalize the stream and return the full committed buffer.
    /// Consumes the encoder: finalization is one-way.
    pub fn finish(mut self) -> Result<EncodedBuffer, CodecError> {
        let trailing = self.codec.flush()?;
        self.committed.push(trailing);
        Ok(self.committed)
    }

    pub fn mime_type(&self) -> AudioMimeType {
        self.codec.mime_type()
    }
}

/// Convert float samples to 16-bit PCM, clamping to [-1, 1] and scaling
/// by 0x7FFF for non-negative and 0x8000 for negative values.
fn convert_to_pcm(input: &[f32]) -> Vec<i16> {
    input
        .iter()
        .map(|&sample| {
            let s = sample.clamp(-1.0, 1.0);
            if s < 0.0 {
                (s * 0x8000 as f32) as i16
            } else {
                (s * 0x7FFF as f32) as i16
            }
        })
        .collect()
}
