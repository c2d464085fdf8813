//! `zstd` backend: single-shot bulk encode/decode with pooled contexts.
//!
//! `zstd::bulk::{Compressor, Decompressor}` each own a native context that is
//! expensive to allocate; pooling them mirrors [`crate::bufpool`]'s
//! acquire/release shape rather than allocating a fresh context per call.

use std::sync::{Mutex, OnceLock};

use crate::error::{MeboError, MeboResult};

const LEVEL: i32 = 3;
const INITIAL_CAPACITY_MULTIPLIER: usize = 4;
const MAX_CAPACITY: usize = 128 * 1024 * 1024;

fn compressor_pool() -> &'static Mutex<Vec<zstd::bulk::Compressor<'static>>> {
    static POOL: OnceLock<Mutex<Vec<zstd::bulk::Compressor<'static>>>> = OnceLock::new();
    POOL.get_or_init(|| Mutex::new(Vec::new()))
}

fn decompressor_pool() -> &'static Mutex<Vec<zstd::bulk::Decompressor<'static>>> {
    static POOL: OnceLock<Mutex<Vec<zstd::bulk::Decompressor<'static>>>> = OnceLock::new();
    POOL.get_or_init(|| Mutex::new(Vec::new()))
}

pub fn compress(input: Vec<u8>) -> MeboResult<Vec<u8>> {
    let mut pool = compressor_pool().lock().unwrap();
    let mut compressor = pool
        .pop()
        .map(Ok)
        .unwrap_or_else(|| zstd::bulk::Compressor::new(LEVEL))
        .map_err(|e| MeboError::CodecFailure(format!("zstd compressor init: {e}")))?;
    let result = compressor
        .compress(&input)
        .map_err(|e| MeboError::CodecFailure(format!("zstd compress: {e}")));
    pool.push(compressor);
    result
}

pub fn decompress(input: Vec<u8>) -> MeboResult<Vec<u8>> {
    let mut pool = decompressor_pool().lock().unwrap();
    let mut decompressor = pool
        .pop()
        .map(Ok)
        .unwrap_or_else(zstd::bulk::Decompressor::new)
        .map_err(|e| MeboError::CodecFailure(format!("zstd decompressor init: {e}")))?;

    let mut capacity = (input.len() * INITIAL_CAPACITY_MULTIPLIER).max(64);
    let result = loop {
        match decompressor.decompress(&input, capacity) {
            Ok(bytes) => break Ok(bytes),
            Err(_) if capacity < MAX_CAPACITY => {
                capacity = (capacity * 2).min(MAX_CAPACITY);
            }
            Err(e) => break Err(MeboError::CodecFailure(format!("zstd decompress: {e}"))),
        }
    };
    pool.push(decompressor);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_small_payload() {
        let data = b"mebo mebo mebo mebo mebo mebo mebo".to_vec();
        let compressed = compress(data.clone()).unwrap();
        assert_eq!(decompress(compressed).unwrap(), data);
    }

    #[test]
    fn roundtrip_payload_larger_than_initial_capacity_guess() {
        let data = vec![7u8; 20_000];
        let compressed = compress(data.clone()).unwrap();
        assert_eq!(decompress(compressed).unwrap(), data);
    }
}
