//! mebo — a binary columnar format for storing many short time-series in a
//! single self-describing blob.
//!
//! A blob packs a fixed header, an index table (one entry per metric), and
//! per-column payload sections (timestamps, values, optional tags) behind a
//! trailing CRC32. Two blob kinds exist: numeric (float64 values, raw or
//! Gorilla-encoded) and text (length-prefixed UTF-8 values). A [`blobset`]
//! ties many blobs of one kind together into a single queryable set.

pub mod bitstream;
pub mod blobset;
pub mod bufpool;
pub mod codec;
pub mod column;
pub mod crc;
pub mod endian;
pub mod error;
pub mod hash;
pub mod numeric;
pub mod section;
pub mod text;
pub mod varint;

pub use blobset::BlobSet;
pub use error::{MeboError, MeboResult};
pub use numeric::{EncoderOptions, NumericBlob, NumericEncoder};
pub use text::{TextBlob, TextEncoder, TextEncoderOptions};

/// Hashes a metric name into its 64-bit identity (xxHash64, seed 0).
///
/// Equivalent to `hash::metric_id`, re-exported at the crate root as the
/// library's primary entry point per the external interface contract.
#[inline]
pub fn encode_metric_id(name: &str) -> u64 {
    hash::metric_id(name)
}

/// Starts a new numeric-blob encoder.
#[inline]
pub fn new_numeric_encoder(start_time: i64, options: EncoderOptions) -> NumericEncoder {
    NumericEncoder::new(start_time, options)
}

/// Starts a new text-blob encoder.
#[inline]
pub fn new_text_encoder(start_time: i64, options: TextEncoderOptions) -> TextEncoder {
    TextEncoder::new(start_time, options)
}

/// Decodes a numeric blob, validating header, index table, and CRC.
#[inline]
pub fn decode_numeric(bytes: &[u8]) -> MeboResult<NumericBlob> {
    numeric::decode(bytes)
}

/// Decodes a text blob, validating header, index table, and CRC.
#[inline]
pub fn decode_text(bytes: &[u8]) -> MeboResult<TextBlob> {
    text::decode(bytes)
}

/// Builds a [`BlobSet`] from already-decoded numeric and text blobs, sorted
/// ascending by `start_time`.
#[inline]
pub fn new_blob_set(numerics: Vec<NumericBlob>, texts: Vec<TextBlob>) -> BlobSet {
    BlobSet::from_blobs(numerics, texts)
}
