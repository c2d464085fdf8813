//! Codec layer (C4): uniform compress/decompress over `{none, zstd, s2, lz4}`.
//!
//! Each backend is a pair of pure `Vec<u8> -> Vec<u8>` functions, selected at
//! runtime by a 1-byte tag stored in the blob header flags, the way
//! `other_examples`' `sneldb` batch codec dispatches on a stored compression
//! tag. Every backend wraps a registry crate as an opaque two-method
//! contract (spec.md §1): none of them reimplement a compression format.

mod lz4;
mod none;
mod s2;
mod zstd_backend;

use crate::error::{MeboError, MeboResult};

/// Compression backend applied to one column's payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionKind {
    None,
    Zstd,
    S2,
    Lz4,
}

impl CompressionKind {
    /// 1-byte tag stored in the header flags for this backend.
    #[inline]
    pub fn tag(self) -> u8 {
        match self {
            CompressionKind::None => 0,
            CompressionKind::Zstd => 1,
            CompressionKind::S2 => 2,
            CompressionKind::Lz4 => 3,
        }
    }

    /// Resolves a header-flags tag back to a backend, rejecting unknown tags
    /// per the closed-enumeration contract (spec: readers must reject unknown
    /// compression tags).
    pub fn from_tag(tag: u8) -> MeboResult<Self> {
        match tag {
            0 => Ok(CompressionKind::None),
            1 => Ok(CompressionKind::Zstd),
            2 => Ok(CompressionKind::S2),
            3 => Ok(CompressionKind::Lz4),
            other => Err(MeboError::CorruptBlob(format!(
                "unknown compression tag {other}"
            ))),
        }
    }

    /// Compresses `input`, consuming it. Empty input returns empty output
    /// without invoking the backend.
    pub fn compress(self, input: Vec<u8>) -> MeboResult<Vec<u8>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }
        match self {
            CompressionKind::None => none::compress(input),
            CompressionKind::Zstd => zstd_backend::compress(input),
            CompressionKind::S2 => s2::compress(input),
            CompressionKind::Lz4 => lz4::compress(input),
        }
    }

    /// Decompresses `input`, consuming it. Empty input returns empty output
    /// without invoking the backend.
    pub fn decompress(self, input: Vec<u8>) -> MeboResult<Vec<u8>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }
        match self {
            CompressionKind::None => none::decompress(input),
            CompressionKind::Zstd => zstd_backend::decompress(input),
            CompressionKind::S2 => s2::decompress(input),
            CompressionKind::Lz4 => lz4::decompress(input),
        }
    }
}
