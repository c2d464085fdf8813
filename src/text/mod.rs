//! Text blob format (C10): timestamp + string-value series, with an
//! optional per-point tag string. Mirrors [`crate::numeric`] with the value
//! column stored as length-prefixed UTF-8 instead of raw/Gorilla floats.

mod blob;
mod encoder;

pub use blob::{decode, TextBlob};
pub use encoder::{TextEncoder, TextEncoderOptions};
