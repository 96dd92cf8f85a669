//! CRC32 checksums over log records.
//!
//! Every record carries a checksum over its length prefix, header and
//! payload. A mismatch on read is corruption, never tolerated.

use crc32fast::Hasher;

/// Computes a CRC32 (IEEE) checksum over `data`.
///
/// Deterministic: identical input always yields an identical checksum.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Returns true when the checksum of `data` equals `expected`.
pub fn verify_checksum(data: &[u8], expected: u32) -> bool {
    compute_checksum(data) == expected
}
