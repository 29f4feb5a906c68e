//! Recording artifact value object

use std::fmt;
use std::sync::Arc;

use super::buffer::EncodedBuffer;

/// Supported audio MIME types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioMimeType {
    Ogg,
    Mp3,
    Wav,
}

impl AudioMimeType {
    /// Get the MIME type string
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ogg => "audio/ogg",
            Self::Mp3 => "audio/mp3",
            Self::Wav => "audio/wav",
        }
    }

    /// Get the file extension
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Ogg => "ogg",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }
}

impl fmt::Display for AudioMimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for AudioMimeType {
    fn default() -> Self {
        Self::Ogg
    }
}

/// The externally consumable compressed audio object produced at preview
/// and terminal points. Cloning shares the underlying storage.
#[derive(Debug, Clone)]
pub struct Artifact {
    bytes: Arc<[u8]>,
    mime_type: AudioMimeType,
}

impl Artifact {
    pub fn new(bytes: Vec<u8>, mime_type: AudioMimeType) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type,
        }
    }

    /// Build an artifact by concatenating an encoded buffer.
    pub fn from_buffer(buffer: &EncodedBuffer, mime_type: AudioMimeType) -> Self {
        Self::new(buffer.concat(), mime_type)
    }

    pub fn data(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> AudioMimeType {
        self.mime_type
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Get human-readable size
    pub fn human_readable_size(&self) -> String {
        let bytes = self.size_bytes();
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_type_as_str() {
        assert_eq!(AudioMimeType::Ogg.as_str(), "audio/ogg");
        assert_eq!(AudioMimeType::Mp3.as_str(), "audio/mp3");
        assert_eq!(AudioMimeType::Wav.as_str(), "audio/wav");
    }

    #[test]
    fn mime_type_extension() {
        assert_eq!(AudioMimeType::Ogg.extension(), "ogg");
        assert_eq!(AudioMimeType::Mp3.extension(), "mp3");
    }

    #[test]
    fn default_mime_type_is_ogg() {
        assert_eq!(AudioMimeType::default(), AudioMimeType::Ogg);
    }

    #[test]
    fn from_buffer_concatenates_chunks() {
        let buffer = EncodedBuffer::from_chunks(vec![vec![1, 2], vec![3]]);
        let artifact = Artifact::from_buffer(&buffer, AudioMimeType::Ogg);
        assert_eq!(artifact.data(), &[1, 2, 3]);
        assert_eq!(artifact.size_bytes(), 3);
    }

    #[test]
    fn clone_shares_storage() {
        let artifact = Artifact::new(vec![0u8; 64], AudioMimeType::Ogg);
        let copy = artifact.clone();
        assert_eq!(artifact.data().as_ptr(), copy.data().as_ptr());
    }

    #[test]
    fn human_readable_size_bytes() {
        let artifact = Artifact::new(vec![0u8; 500], AudioMimeType::Ogg);
        assert_eq!(artifact.human_readable_size(), "500 B");
    }

    #[test]
    fn human_readable_size_kb() {
        let artifact = Artifact::new(vec![0u8; 2048], AudioMimeType::Ogg);
        assert_eq!(artifact.human_readable_size(), "2.0 KB");
    }
}
