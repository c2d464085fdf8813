//! Crate-wide error type.
//!
//! Mirrors the teacher's manual-enum error style (`block::compress::Lz4Error`,
//! `block::decompress_core::DecompressError`): a small `Copy`-free enum with a
//! hand-written `Display` and `std::error::Error` impl, no `thiserror`. Each
//! variant carries a `String` naming the failed step so a caller never has to
//! guess which invariant tripped.

use core::fmt;

/// Errors raised by the encoder, decoder, and blob-set layers.
///
/// `NotFound`-style lookups (unknown metric, out-of-range index) are
/// deliberately *not* a variant here — per the format's contract those
/// surface as a `(value, found)` pair at the call site so hot accessor
/// paths stay allocation- and branch-free on the error path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeboError {
    /// Misuse of the encoder: zero-length record, out-of-order timestamp,
    /// exceeding a declared count, finishing an open metric, duplicate
    /// metric ID within one blob, and similar caller contract violations.
    InvalidArgument(String),
    /// A closed-form limit was exceeded: metric count > 65535, total points
    /// > 2^32-1, or a payload section too large to address with its offset
    /// width.
    LimitExceeded(String),
    /// A compression backend reported failure; the backend's own message is
    /// folded in as context.
    CodecFailure(String),
    /// The decoded bytes are not a valid blob: bad magic, unknown version,
    /// undefined flag bits, CRC mismatch, or an internal offset/count that
    /// does not agree with the declared structure.
    CorruptBlob(String),
}

impl fmt::Display for MeboError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeboError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            MeboError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            MeboError::CodecFailure(msg) => write!(f, "codec failure: {msg}"),
            MeboError::CorruptBlob(msg) => write!(f, "corrupt blob: {msg}"),
        }
    }
}

impl std::error::Error for MeboError {}

/// Convenience alias used throughout the encoder/decoder APIs.
pub type MeboResult<T> = Result<T, MeboError>;
