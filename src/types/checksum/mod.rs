#![forbid(unsafe_code)]
//! CRC32 framing for encoded node images.

/// Checksum of an encoded node image, salted with the node id so an image
/// filed under the wrong id fails verification.
pub fn image_crc32(node_id: u64, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&node_id.to_be_bytes());
    hasher.update(payload);
    hasher.finalize()
}
