//! Ogg/Opus block codec
//!
//! Produces an Ogg stream incrementally: two header packets (OpusHead,
//! OpusTags) followed by one 20 ms Opus frame per block. Every data
//! packet closes its page, so each encoded block yields a complete,
//! independently appendable chunk and a pause point loses at most the
//! sub-frame residue. A resumed session appends a fresh stream after the
//! carried-over pages, which is the chained layout Ogg defines.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use ogg::writing::{PacketWriteEndInfo, PacketWriter};

use crate::application::ports::{BlockCodec, CodecError, CodecFactory};
use crate::domain::recording::{AudioMimeType, SessionConstraints};

/// Sample rates libopus accepts
const SUPPORTED_SAMPLE_RATES: [u32; 5] = [8_000, 12_000, 16_000, 24_000, 48_000];

/// Maximum encoded Opus packet size
const MAX_PACKET_SIZE: usize = 4000;

/// Factory producing one [`OggOpusCodec`] per session
#[derive(Debug, Default)]
pub struct OggOpusFactory;

impl OggOpusFactory {
    pub fn new() -> Self {
        Self
    }
}

impl CodecFactory for OggOpusFactory {
    fn create(&self, constraints: &SessionConstraints) -> Result<Box<dyn BlockCodec>, CodecError> {
        Ok(Box::new(OggOpusCodec::new(constraints)?))
    }

    fn mime_type(&self) -> AudioMimeType {
        AudioMimeType::Ogg
    }
}

/// Collects bytes emitted by the Ogg packet writer so finished pages can
/// be drained incrementally.
#[derive(Clone, Default)]
struct ChunkSink(Arc<Mutex<Vec<u8>>>);

impl ChunkSink {
    fn drain(&self) -> Vec<u8> {
        std::mem::take(&mut self.0.lock().unwrap())
    }
}

impl Write for ChunkSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Opus encoder writing into an in-memory Ogg stream
pub struct OggOpusCodec {
    encoder: opus::Encoder,
    writer: PacketWriter<'static, ChunkSink>,
    sink: ChunkSink,
    pcm: Vec<i16>,
    frame_size: usize,
    serial: u32,
    granule_pos: u64,
    finished: bool,
}

impl std::fmt::Debug for OggOpusCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OggOpusCodec")
            .field("pcm", &self.pcm)
            .field("frame_size", &self.frame_size)
            .field("serial", &self.serial)
            .field("granule_pos", &self.granule_pos)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl OggOpusCodec {
    pub fn new(constraints: &SessionConstraints) -> Result<Self, CodecError> {
        let sample_rate = constraints.sample_rate();
        if !SUPPORTED_SAMPLE_RATES.contains(&sample_rate) {
            return Err(CodecError::Construction(format!(
                "unsupported sample rate: {sample_rate} Hz"
            )));
        }

        let mut encoder =
            opus::Encoder::new(sample_rate, opus::Channels::Mono, opus::Application::Audio)
                .map_err(|e| CodecError::Construction(e.to_string()))?;
        encoder
            .set_bitrate(opus::Bitrate::Bits(constraints.bit_rate() as i32))
            .map_err(|e| CodecError::Construction(e.to_string()))?;
        encoder
            .set_vbr(true)
            .map_err(|e| CodecError::Construction(e.to_string()))?;

        let sink = ChunkSink::default();
        let writer = PacketWriter::new(sink.clone());

        let mut codec = Self {
            encoder,
            writer,
            sink,
            pcm: Vec::new(),
            // One 20ms frame per block
            frame_size: (sample_rate / 50) as usize,
            serial: rand_serial(),
            granule_pos: 0,
            finished: false,
        };
        codec.write_opus_headers(sample_rate)?;
        Ok(codec)
    }

    /// Write Opus identification and comment headers
    fn write_opus_headers(&mut self, sample_rate: u32) -> Result<(), CodecError> {
        // Opus identification header (required by spec)
        let mut id_header = Vec::with_capacity(19);
        id_header.extend_from_slice(b"OpusHead"); // Magic signature
        id_header.push(1); // Version
        id_header.push(1); // Channel count (mono)
        id_header.extend_from_slice(&0u16.to_le_bytes()); // Pre-skip
        id_header.extend_from_slice(&sample_rate.to_le_bytes()); // Original sample rate
        id_header.extend_from_slice(&0i16.to_le_bytes()); // Output gain
        id_header.push(0); // Channel mapping family

        self.writer
            .write_packet(id_header, self.serial, PacketWriteEndInfo::EndPage, 0)
            .map_err(|e| CodecError::Construction(e.to_string()))?;

        // Opus comment header (required by spec)
        let mut comment_header = Vec::new();
        comment_header.extend_from_slice(b"OpusTags"); // Magic signature
        let vendor = b"mictape";
        comment_header.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
        comment_header.extend_from_slice(vendor);
        comment_header.extend_from_slice(&0u32.to_le_bytes()); // No user comments

        self.writer
            .write_packet(comment_header, self.serial, PacketWriteEndInfo::EndPage, 0)
            .map_err(|e| CodecError::Construction(e.to_string()))?;

        Ok(())
    }

    fn write_frame(
        &mut self,
        frame: &[i16],
        end_info: PacketWriteEndInfo,
    ) -> Result<(), CodecError> {
        let mut packet = vec![0u8; MAX_PACKET_SIZE];
        let len = self
            .encoder
            .encode(frame, &mut packet)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        packet.truncate(len);

        self.granule_pos += frame.len() as u64;
        self.writer
            .write_packet(packet, self.serial, end_info, self.granule_pos)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(())
    }
}

impl BlockCodec for OggOpusCodec {
    fn block_size(&self) -> usize {
        self.frame_size
    }

    fn encode_block(&mut self, samples: &[i16]) -> Result<Vec<u8>, CodecError> {
        if self.finished {
            return Err(CodecError::Encode("stream already finalized".to_string()));
        }
        self.pcm.extend_from_slice(samples);
        while self.pcm.len() >= self.frame_size {
            let frame: Vec<i16> = self.pcm.drain(..self.frame_size).collect();
            self.write_frame(&frame, PacketWriteEndInfo::EndPage)?;
        }
        Ok(self.sink.drain())
    }

    fn flush(&mut self) -> Result<Vec<u8>, CodecError> {
        if self.finished {
            return Err(CodecError::Flush("stream already finalized".to_string()));
        }
        self.finished = true;

        // Pad the trailing partial frame with silence; the codec only
        // accepts whole frames.
        let mut frame = std::mem::take(&mut self.pcm);
        frame.resize(self.frame_size, 0);
        self.write_frame(&frame, PacketWriteEndInfo::EndStream)?;

        Ok(self.sink.drain())
    }

    fn mime_type(&self) -> AudioMimeType {
        AudioMimeType::Ogg
    }
}

/// Generate a pseudo-random serial number for the Ogg stream
fn rand_serial() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    // Mix time components for randomness
    (duration.as_secs() as u32) ^ duration.subsec_nanos()
}
