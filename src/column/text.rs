//! Length-prefixed string column codec (C5/C6), used for text metric values
//! and for the optional tag column on both numeric and text blobs.
//!
//! Each element is `varint(length) | utf8 bytes`; a parallel fixed-width
//! offset table (one u32 per element, in the blob's endianness) gives direct
//! byte addressing into the data stream, so random access needs no walk once
//! both subcolumns are decompressed — unlike the timestamp/value columns,
//! there is no cursor or cache here.

use crate::endian::Endian;
use crate::error::{MeboError, MeboResult};
use crate::varint::{read_uvarint, write_uvarint};

fn corrupt(what: &str) -> MeboError {
    MeboError::CorruptBlob(format!("malformed text column: {what}"))
}

/// Encodes a record's string elements, returning `(data, offsets)`. `offsets`
/// is emitted as its own subcolumn so it can be compressed independently.
pub fn encode(endian: Endian, values: &[&str]) -> (Vec<u8>, Vec<u8>) {
    let mut data = Vec::new();
    let mut offsets = vec![0u8; values.len() * 4];
    for (i, v) in values.iter().enumerate() {
        endian.write_u32(&mut offsets, i * 4, data.len() as u32);
        write_uvarint(&mut data, v.len() as u64);
        data.extend_from_slice(v.as_bytes());
    }
    (data, offsets)
}

#[inline]
fn offset_at(endian: Endian, offsets: &[u8], i: usize) -> u32 {
    endian.read_u32(offsets, i * 4)
}

/// Returns the `i`-th element. Caller guarantees `i < count`; index bounds
/// against the declared record length are checked by the blob accessor.
pub fn value_at<'a>(
    endian: Endian,
    data: &'a [u8],
    offsets: &[u8],
    i: usize,
) -> MeboResult<&'a str> {
    let offset = offset_at(endian, offsets, i) as usize;
    let (len, consumed) = read_uvarint(data, offset).ok_or_else(|| corrupt("truncated length"))?;
    let start = offset + consumed;
    let end = start
        .checked_add(len as usize)
        .ok_or_else(|| corrupt("length overflow"))?;
    let bytes = data
        .get(start..end)
        .ok_or_else(|| corrupt("element out of bounds"))?;
    std::str::from_utf8(bytes).map_err(|_| corrupt("invalid utf-8"))
}

pub fn decode_all<'a>(
    endian: Endian,
    data: &'a [u8],
    offsets: &[u8],
    count: usize,
) -> MeboResult<Vec<&'a str>> {
    (0..count).map(|i| value_at(endian, data, offsets, i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_mixed_lengths_including_empty() {
        let values = ["a", "b", "", "hello world", "a"];
        for endian in [Endian::Little, Endian::Big] {
            let (data, offsets) = encode(endian, &values);
            let decoded = decode_all(endian, &data, &offsets, values.len()).unwrap();
            assert_eq!(decoded, values);
        }
    }

    #[test]
    fn second_equal_string_decodes_independently() {
        let values = ["INFO", "WARN", "INFO"];
        let (data, offsets) = encode(Endian::Little, &values);
        let first_info = value_at(Endian::Little, &data, &offsets, 0).unwrap();
        let second_info = value_at(Endian::Little, &data, &offsets, 2).unwrap();
        assert_eq!(first_info, second_info);
        assert_eq!(offset_at(Endian::Little, &offsets, 0), 0);
        assert_ne!(
            offset_at(Endian::Little, &offsets, 0),
            offset_at(Endian::Little, &offsets, 2)
        );
    }

    #[test]
    fn random_access_matches_sequential_decode() {
        let values = ["one", "two", "three", "four"];
        let (data, offsets) = encode(Endian::Big, &values);
        let all = decode_all(Endian::Big, &data, &offsets, values.len()).unwrap();
        for i in 0..values.len() {
            assert_eq!(value_at(Endian::Big, &data, &offsets, i).unwrap(), all[i]);
        }
    }
}
