//! Timestamp column codec (part of C5/C6): raw fixed-width or
//! delta-of-delta zigzag-varint, per metric record.

use std::cell::Cell;

use crate::endian::Endian;
use crate::error::{MeboError, MeboResult};
use crate::varint::{read_varint_i64, write_varint_i64};

/// Per-column encoding tag, stored in the blob header flags (bits 3-4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampEncoding {
    Raw,
    Delta,
}

impl TimestampEncoding {
    #[inline]
    pub fn tag(self) -> u8 {
        match self {
            TimestampEncoding::Raw => 0,
            TimestampEncoding::Delta => 1,
        }
    }

    pub fn from_tag(tag: u8) -> MeboResult<Self> {
        match tag {
            0 => Ok(TimestampEncoding::Raw),
            1 => Ok(TimestampEncoding::Delta),
            other => Err(MeboError::CorruptBlob(format!(
                "unknown timestamp encoding tag {other}"
            ))),
        }
    }
}

fn corrupt_truncated() -> MeboError {
    MeboError::CorruptBlob("truncated delta-of-delta timestamp stream".to_string())
}

// ── Raw ──────────────────────────────────────────────────────────────────

pub fn encode_raw(endian: Endian, timestamps: &[i64]) -> Vec<u8> {
    let mut buf = vec![0u8; timestamps.len() * 8];
    for (i, &t) in timestamps.iter().enumerate() {
        endian.write_i64(&mut buf, i * 8, t);
    }
    buf
}

#[inline]
pub fn decode_raw_at(endian: Endian, bytes: &[u8], i: usize) -> i64 {
    endian.read_i64(bytes, i * 8)
}

pub fn decode_raw_all(endian: Endian, bytes: &[u8], count: usize) -> Vec<i64> {
    (0..count).map(|i| decode_raw_at(endian, bytes, i)).collect()
}

// ── Delta-of-delta ───────────────────────────────────────────────────────

/// Encodes a record's timestamps as zigzag-varint second differences, with
/// `start_time` as the implicit predecessor of the first element. A
/// single-point record degenerates to just the first varint.
pub fn encode_delta(start_time: i64, timestamps: &[i64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(timestamps.len() * 2);
    if timestamps.is_empty() {
        return out;
    }
    write_varint_i64(&mut out, timestamps[0] - start_time);
    if timestamps.len() == 1 {
        return out;
    }
    let mut prev_delta = timestamps[1] - timestamps[0];
    write_varint_i64(&mut out, prev_delta);
    let mut prev = timestamps[1];
    for &t in &timestamps[2..] {
        let delta = t - prev;
        write_varint_i64(&mut out, delta - prev_delta);
        prev_delta = delta;
        prev = t;
    }
    out
}

/// State of a delta-of-delta walk after decoding element `index`.
#[derive(Clone, Copy)]
struct DeltaState {
    index: usize,
    byte_pos: usize,
    ts: i64,
    delta: i64,
}

/// Decodes one more element of the stream given the state after `index`,
/// returning the state after `index + 1`.
fn advance(bytes: &[u8], state: DeltaState) -> MeboResult<DeltaState> {
    let (raw, len) = read_varint_i64(bytes, state.byte_pos).ok_or_else(corrupt_truncated)?;
    let (ts, delta) = if state.index == 0 {
        (state.ts + raw, raw)
    } else {
        let delta = state.delta + raw;
        (state.ts + delta, delta)
    };
    Ok(DeltaState {
        index: state.index + 1,
        byte_pos: state.byte_pos + len,
        ts,
        delta,
    })
}

/// Decodes `count` timestamps starting at `bytes[0]`, returning the values
/// and the number of bytes consumed (the caller uses the latter to locate
/// the next record when several records' streams are concatenated).
pub fn decode_delta_all(start_time: i64, bytes: &[u8], count: usize) -> MeboResult<(Vec<i64>, usize)> {
    let mut out = Vec::with_capacity(count);
    if count == 0 {
        return Ok((out, 0));
    }
    let (d0, len) = read_varint_i64(bytes, 0).ok_or_else(corrupt_truncated)?;
    let mut state = DeltaState {
        index: 0,
        byte_pos: len,
        ts: start_time + d0,
        delta: 0,
    };
    out.push(state.ts);
    for _ in 1..count {
        state = advance(bytes, state)?;
        out.push(state.ts);
    }
    Ok((out, state.byte_pos))
}

/// Stateful indexed-access view over one record's delta-of-delta stream.
/// Caches the last decoded position so that strictly increasing `value_at`
/// calls are amortized O(1); a lower or unrelated index restarts the walk
/// from the record start.
pub struct DeltaCursor<'a> {
    start_time: i64,
    bytes: &'a [u8],
    cache: Cell<Option<DeltaState>>,
}

impl<'a> DeltaCursor<'a> {
    pub fn new(start_time: i64, bytes: &'a [u8]) -> Self {
        Self {
            start_time,
            bytes,
            cache: Cell::new(None),
        }
    }

    pub fn value_at(&self, count: usize, i: usize) -> MeboResult<Option<i64>> {
        if i >= count {
            return Ok(None);
        }
        let mut state = match self.cache.get() {
            Some(s) if s.index <= i => s,
            _ => {
                let (d0, len) = read_varint_i64(self.bytes, 0).ok_or_else(corrupt_truncated)?;
                DeltaState {
                    index: 0,
                    byte_pos: len,
                    ts: self.start_time + d0,
                    delta: 0,
                }
            }
        };
        while state.index < i {
            state = advance(self.bytes, state)?;
        }
        self.cache.set(Some(state));
        Ok(Some(state.ts))
    }
}
