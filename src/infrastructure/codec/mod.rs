//! Codec infrastructure module

mod ogg_opus;

pub use ogg_opus::{OggOpusCodec, OggOpusFactory};
