pub mod database;
pub mod folder;
pub mod metadata;
pub mod store;

use sha2::{Digest, Sha256};

use crate::models::blob::hex_encode;

/// Map a node id to a filesystem-safe file stem.
///
/// Strips characters outside `[A-Za-z0-9 .,_-]`, collapses whitespace runs to
/// a single space and trims the ends. Only the folder backend uses this; the
/// database keys blobs by the raw id.
pub fn sanitize_ext_id(ext_id: &str) -> String {
    let kept: String = ext_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | ',' | '_' | '-'))
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// File stem a node's blob is stored and exported under.
///
/// Ids that sanitize to nothing get `audio-<hash>` so distinct ids never
/// share a file.
pub fn audio_file_stem(ext_id: &str) -> String {
    let stem = sanitize_ext_id(ext_id);
    if !stem.is_empty() {
        return stem;
    }
    let digest = Sha256::digest(ext_id.as_bytes());
    format!("audio-{}", hex_encode(&digest[..4]))
}
