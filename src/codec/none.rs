//! Identity codec: the column bytes pass through unchanged.

use crate::error::MeboResult;

pub fn compress(input: Vec<u8>) -> MeboResult<Vec<u8>> {
    Ok(input)
}

pub fn decompress(input: Vec<u8>) -> MeboResult<Vec<u8>> {
    Ok(input)
}
