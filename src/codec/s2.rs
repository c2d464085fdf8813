//! `s2` backend: Snappy-compatible, stateless single-shot compression.
//!
//! The `snap` crate's raw format embeds the uncompressed length in its frame,
//! so decompression needs no capacity guess (unlike the zstd bulk API or raw
//! LZ4 blocks).

use snap::raw::{Decoder, Encoder};

use crate::error::{MeboError, MeboResult};

pub fn compress(input: Vec<u8>) -> MeboResult<Vec<u8>> {
    Encoder::new()
        .compress_vec(&input)
        .map_err(|e| MeboError::CodecFailure(format!("s2 compress: {e}")))
}

pub fn decompress(input: Vec<u8>) -> MeboResult<Vec<u8>> {
    Decoder::new()
        .decompress_vec(&input)
        .map_err(|e| MeboError::CodecFailure(format!("s2 decompress: {e}")))
}
