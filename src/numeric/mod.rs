//! Numeric blob format (C8/C9): timestamp + float64 value series, with an
//! optional per-point tag string.

mod blob;
mod encoder;

pub use blob::{decode, NumericBlob};
pub use encoder::{EncoderOptions, NumericEncoder};
