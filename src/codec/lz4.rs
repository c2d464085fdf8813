//! `lz4` backend: thin wrapper around the `lz4_flex` crate's block API, the
//! same pure-Rust LZ4 dependency used elsewhere in the corpus
//! (`sneldb`/`cqlite`/`rerun` all depend on `lz4_flex` rather than
//! reimplementing the format).
//!
//! `compress_prepend_size`/`decompress_size_prepended` store the
//! uncompressed length as a 4-byte prefix, so decompression needs no
//! capacity guess (unlike the zstd bulk API).

use crate::error::{MeboError, MeboResult};

pub fn compress(input: Vec<u8>) -> MeboResult<Vec<u8>> {
    Ok(lz4_flex::block::compress_prepend_size(&input))
}

pub fn decompress(input: Vec<u8>) -> MeboResult<Vec<u8>> {
    lz4_flex::block::decompress_size_prepended(&input)
        .map_err(|e| MeboError::CodecFailure(format!("lz4 decompress: {e}")))
}
