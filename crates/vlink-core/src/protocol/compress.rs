// ============================================
// File: crates/vlink-core/src/protocol/compress.rs
// ============================================
//! # Payload Compression
//!
//! ## Main Functionality
//! - `compress`: zstd-compress a payload when it actually shrinks
//! - `decompress`: inflate a payload with a hard output cap
//!
//! ## ⚠️ Important Note for Next Developer
//! - Decompression is bounded by the caller's cap; a payload that would
//!   inflate past it is malformed, never truncated
//!
//! ## Last Modified
//! v0.1.0 - zstd payload compression

use crate::error::{CoreError, Result};

/// zstd level used for packet payloads.
pub const COMPRESSION_LEVEL: i32 = 3;

/// Payloads shorter than this are never compressed.
pub const MIN_COMPRESSIBLE_SIZE: usize = 32;

/// Compresses `data`, returning `None` if that would not save space.
#[must_use]
pub fn compress(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() < MIN_COMPRESSIBLE_SIZE {
        return None;
    }
    match zstd::bulk::compress(data, COMPRESSION_LEVEL) {
        Ok(out) if out.len() < data.len() => Some(out),
        _ => None,
    }
}

/// Decompresses `data` into at most `max_len` bytes.
///
/// # Errors
/// `Compression` if the input is not valid zstd or inflates past `max_len`.
pub fn decompress(data: &[u8], max_len: usize) -> Result<Vec<u8>> {
    zstd::bulk::decompress(data, max_len).map_err(|e| CoreError::compression(e.to_string()))
}
