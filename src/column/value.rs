//! Value column codec (part of C5/C6): raw fixed-width float64 or
//! Gorilla XOR bit-packed encoding, per metric record.
//!
//! The Gorilla window-reuse scheme is grounded in `other_examples`'
//! `givia-gorilla` encoder's `encode_value`, adapted to the 5-bit
//! leading-zero-count field this format specifies (vs. that example's 6 bits):
//! a leading-zero count above 31 is clamped to 31 for storage — the decoded
//! window is then wider than strictly necessary but still exactly reproduces
//! the XOR, since the extra high bits it covers are zero by construction.
//! Unlike that example, the record length is always known up front from the
//! section index, so there is no end-of-stream sentinel to write or read.

use std::cell::Cell;

use crate::bitstream::{BitReader, BitWriter};
use crate::endian::Endian;
use crate::error::{MeboError, MeboResult};

/// Per-column encoding tag, stored in the blob header flags (bits 5-6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueEncoding {
    Raw,
    Gorilla,
}

impl ValueEncoding {
    #[inline]
    pub fn tag(self) -> u8 {
        match self {
            ValueEncoding::Raw => 0,
            ValueEncoding::Gorilla => 1,
        }
    }

    pub fn from_tag(tag: u8) -> MeboResult<Self> {
        match tag {
            0 => Ok(ValueEncoding::Raw),
            1 => Ok(ValueEncoding::Gorilla),
            other => Err(MeboError::CorruptBlob(format!(
                "unknown value encoding tag {other}"
            ))),
        }
    }
}

fn corrupt_truncated() -> MeboError {
    MeboError::CorruptBlob("truncated gorilla value stream".to_string())
}

const MAX_LEADING_ZERO_FIELD: u32 = 31;

#[inline]
fn bitmask(n: u32) -> u64 {
    if n >= 64 {
        u64::MAX
    } else {
        (1u64 << n) - 1
    }
}

// ── Raw ──────────────────────────────────────────────────────────────────

pub fn encode_raw(endian: Endian, values: &[f64]) -> Vec<u8> {
    let mut buf = vec![0u8; values.len() * 8];
    for (i, &v) in values.iter().enumerate() {
        endian.write_f64(&mut buf, i * 8, v);
    }
    buf
}

#[inline]
pub fn decode_raw_at(endian: Endian, bytes: &[u8], i: usize) -> f64 {
    endian.read_f64(bytes, i * 8)
}

pub fn decode_raw_all(endian: Endian, bytes: &[u8], count: usize) -> Vec<f64> {
    (0..count).map(|i| decode_raw_at(endian, bytes, i)).collect()
}

// ── Gorilla ──────────────────────────────────────────────────────────────

/// Window used by the "new window" branch: leading-zero count (already
/// clamped to [`MAX_LEADING_ZERO_FIELD`]) and the meaningful-bit count.
#[derive(Clone, Copy)]
struct Window {
    leading: u32,
    meaningful_bits: u32,
}

pub fn encode_gorilla(values: &[f64]) -> Vec<u8> {
    let mut w = BitWriter::new();
    if values.is_empty() {
        return w.into_bytes();
    }
    let mut prev_bits = values[0].to_bits();
    w.write_bits(prev_bits, 64);

    let mut window: Option<Window> = None;
    for &v in &values[1..] {
        let bits = v.to_bits();
        let xor = bits ^ prev_bits;
        if xor == 0 {
            w.write_bit(false);
        } else {
            w.write_bit(true);
            let leading = (xor.leading_zeros()).min(MAX_LEADING_ZERO_FIELD);
            let trailing = xor.trailing_zeros();
            let meaningful_bits = 64 - leading - trailing;

            let reuse = window
                .map(|cur| leading >= cur.leading && trailing >= 64 - cur.leading - cur.meaningful_bits)
                .unwrap_or(false);

            if reuse {
                let cur = window.unwrap();
                let cur_trailing = 64 - cur.leading - cur.meaningful_bits;
                w.write_bit(false);
                let value = (xor >> cur_trailing) & bitmask(cur.meaningful_bits);
                w.write_bits(value, cur.meaningful_bits as u8);
            } else {
                w.write_bit(true);
                w.write_bits(leading as u64, 5);
                w.write_bits((meaningful_bits - 1) as u64, 6);
                let value = (xor >> trailing) & bitmask(meaningful_bits);
                w.write_bits(value, meaningful_bits as u8);
                window = Some(Window { leading, meaningful_bits });
            }
        }
        prev_bits = bits;
    }
    w.into_bytes()
}

/// State of a Gorilla walk after decoding element `index`.
#[derive(Clone, Copy)]
struct GorillaState {
    index: usize,
    bit_pos: usize,
    prev_bits: u64,
    window: Option<Window>,
}

fn advance(bytes: &[u8], state: GorillaState) -> MeboResult<GorillaState> {
    let mut r = BitReader::new_at(bytes, state.bit_pos);

    let changed = r.read_bit().ok_or_else(corrupt_truncated)?;
    let (bits, window) = if !changed {
        (state.prev_bits, state.window)
    } else {
        let new_window = r.read_bit().ok_or_else(corrupt_truncated)?;
        let win = if new_window {
            let leading = r.read_bits(5).ok_or_else(corrupt_truncated)? as u32;
            let meaningful_bits = r.read_bits(6).ok_or_else(corrupt_truncated)? as u32 + 1;
            Window { leading, meaningful_bits }
        } else {
            state.window.ok_or_else(corrupt_truncated)?
        };
        let trailing = 64 - win.leading - win.meaningful_bits;
        let value = r.read_bits(win.meaningful_bits as u8).ok_or_else(corrupt_truncated)?;
        let xor = value << trailing;
        (state.prev_bits ^ xor, Some(win))
    };

    Ok(GorillaState {
        index: state.index + 1,
        bit_pos: r.bit_pos(),
        prev_bits: bits,
        window,
    })
}

/// Decodes `count` values starting at `bytes[0]`, returning the values and
/// the number of whole bytes consumed (each record's stream is padded to a
/// byte boundary by the encoder so consecutive records concatenate cleanly).
pub fn decode_gorilla_all(bytes: &[u8], count: usize) -> MeboResult<(Vec<f64>, usize)> {
    let mut out = Vec::with_capacity(count);
    if count == 0 {
        return Ok((out, 0));
    }
    let mut r = BitReader::new(bytes);
    let first_bits = r.read_bits(64).ok_or_else(corrupt_truncated)?;
    out.push(f64::from_bits(first_bits));
    let mut state = GorillaState {
        index: 0,
        bit_pos: r.bit_pos(),
        prev_bits: first_bits,
        window: None,
    };
    for _ in 1..count {
        state = advance(bytes, state)?;
        out.push(f64::from_bits(state.prev_bits));
    }
    Ok((out, (state.bit_pos + 7) / 8))
}

/// Stateful indexed-access view over one record's Gorilla stream, caching
/// the last decoded position the same way [`crate::column::timestamp::DeltaCursor`]
/// does; out-of-order access restarts the walk from the record start.
pub struct GorillaCursor<'a> {
    bytes: &'a [u8],
    cache: Cell<Option<GorillaState>>,
}

impl<'a> GorillaCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            cache: Cell::new(None),
        }
    }

    pub fn value_at(&self, count: usize, i: usize) -> MeboResult<Option<f64>> {
        if i >= count {
            return Ok(None);
        }
        let mut state = match self.cache.get() {
            Some(s) if s.index <= i => s,
            _ => {
                let mut r = BitReader::new(self.bytes);
                let first_bits = r.read_bits(64).ok_or_else(corrupt_truncated)?;
                GorillaState {
                    index: 0,
                    bit_pos: r.bit_pos(),
                    prev_bits: first_bits,
                    window: None,
                }
            }
        };
        while state.index < i {
            state = advance(self.bytes, state)?;
        }
        self.cache.set(Some(state));
        Ok(Some(f64::from_bits(state.prev_bits)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_roundtrip_preserves_nan_bits() {
        let nan = f64::from_bits(0x7ff8_0000_dead_beef);
        let values = [1.0, -2.5, nan, f64::MAX, f64::MIN, 0.0, -0.0];
        for endian in [Endian::Little, Endian::Big] {
            let bytes = encode_raw(endian, &values);
            let decoded = decode_raw_all(endian, &bytes, values.len());
            for (a, b) in values.iter().zip(decoded.iter()) {
                assert_eq!(a.to_bits(), b.to_bits());
            }
        }
    }

    #[test]
    fn gorilla_roundtrip_identical_values() {
        let values = vec![42.0f64; 10];
        let bytes = encode_gorilla(&values);
        let (decoded, consumed) = decode_gorilla_all(&bytes, values.len()).unwrap();
        assert_eq!(decoded, values);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn gorilla_roundtrip_varying_values() {
        let values = vec![1.0, 1.0, 2.0, 2.5, 100.25, -3.0, 0.0, 1e10, -1e-10];
        let bytes = encode_gorilla(&values);
        let (decoded, consumed) = decode_gorilla_all(&bytes, values.len()).unwrap();
        for (a, b) in values.iter().zip(decoded.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn gorilla_roundtrip_single_value() {
        let values = vec![7.5f64];
        let bytes = encode_gorilla(&values);
        let (decoded, consumed) = decode_gorilla_all(&bytes, 1).unwrap();
        assert_eq!(decoded, values);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn gorilla_cursor_matches_sequential_decode() {
        let values: Vec<f64> = (0..30).map(|i| (i as f64).sin() * 1000.0).collect();
        let bytes = encode_gorilla(&values);
        let cursor = GorillaCursor::new(&bytes);
        for (i, &expect) in values.iter().enumerate() {
            let got = cursor.value_at(values.len(), i).unwrap().unwrap();
            assert_eq!(got.to_bits(), expect.to_bits());
        }
    }

    #[test]
    fn gorilla_window_reuse_across_large_leading_zero_counts() {
        // Forces leading zero counts above 31 to exercise the storage clamp.
        let values = vec![1.0f64, 1.0000000001, 1.0000000002, 1.0000000003];
        let bytes = encode_gorilla(&values);
        let (decoded, consumed) = decode_gorilla_all(&bytes, values.len()).unwrap();
        for (a, b) in values.iter().zip(decoded.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        assert_eq!(consumed, bytes.len());
    }
}
