use sha2::{Digest, Sha256};

/// Encoded audio bytes tagged with their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBlob {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl AudioBlob {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// SHA-256 digest of the encoded bytes.
    pub fn digest(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&Sha256::digest(&self.bytes));
        out
    }

    /// Hex-encoded SHA-256 digest.
    pub fn checksum(&self) -> String {
        hex_encode(&self.digest())
    }
}

/// A blob ready to be saved under the node's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedClip {
    pub file_name: String,
    pub blob: AudioBlob,
}

const KNOWN_TYPES: &[(&str, &str)] = &[
    ("webm", "audio/webm"),
    ("ogg", "audio/ogg"),
    ("opus", "audio/ogg"),
    ("wav", "audio/wav"),
    ("mp3", "audio/mpeg"),
    ("m4a", "audio/mp4"),
    ("aac", "audio/aac"),
    ("flac", "audio/flac"),
];

pub fn mime_essence(mime: &str) -> &str {
    mime.split(';').next().unwrap_or("").trim()
}

/// File extension for a MIME type, if it is a known audio container.
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let essence = mime_essence(mime).to_ascii_lowercase();
    match essence.as_str() {
        "audio/x-wav" | "audio/wave" | "audio/vnd.wave" => Some("wav"),
        "audio/mp3" => Some("mp3"),
        "audio/x-m4a" => Some("m4a"),
        "audio/x-flac" => Some("flac"),
        other => KNOWN_TYPES
            .iter()
            .find(|(_, m)| *m == other)
            .map(|(ext, _)| *ext),
    }
}

/// MIME type for a file extension, if it is a known audio container.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.to_ascii_lowercase();
    KNOWN_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_parameters_are_ignored() {
        assert_eq!(extension_for_mime("audio/webm;codecs=opus"), Some("webm"));
        assert_eq!(extension_for_mime("audio/x-wav"), Some("wav"));
        assert_eq!(extension_for_mime("video/mp4"), None);
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert_eq!(mime_for_extension("MP3"), Some("audio/mpeg"));
        assert_eq!(mime_for_extension("txt"), None);
    }

    #[test]
    fn checksum_is_sha256_hex() {
        let blob = AudioBlob::new(b"abc".to_vec(), "audio/webm");
        assert_eq!(
            blob.checksum(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
