//! Section layout (C7): fixed header, index table, payload sections, CRC.
//!
//! Grounded on the teacher's `block::types` constant-table style for the bit
//! layout and on `crc.rs` for the trailer; the header/index parsing shape
//! mirrors how the teacher's frame layer walks a fixed prefix before handing
//! off to the variable-length body, generalized here to a table of
//! fixed-width index entries instead of a single frame descriptor.
//!
//! Header is 40 bytes. The named fields (magic 4 + version 1 + flags 2 +
//! metric count 2 + total points 4 + start-time 8 + three 4-byte section
//! offsets 12) total 33 bytes; the reserved tail is widened from 1 to 7
//! bytes so the header ends on an 8-byte boundary, keeping the index table
//! - and every fixed-width column that follows it - 8-byte aligned for a
//! blob that itself starts at an 8-byte-aligned address.
use crate::codec::CompressionKind;
use crate::column::{timestamp::TimestampEncoding, value::ValueEncoding};
use crate::endian::Endian;
use crate::error::{MeboError, MeboResult};

/// Total header size in bytes. See the module doc for how this resolves the
/// format's own header field list against its layout diagram.
pub const HEADER_LEN: usize = 40;

/// Size of one index-table entry: metric ID (8B) + first-point offset (4B)
/// within the decompressed value stream + point count (4B).
pub const INDEX_ENTRY_LEN: usize = 16;

/// Trailing checksum width.
pub const CRC_LEN: usize = 4;

/// Magic bytes identifying a numeric blob. Frozen: changing these breaks
/// every blob written so far.
pub const MAGIC_NUMERIC: [u8; 4] = *b"MEB1";
/// Magic bytes identifying a text blob.
pub const MAGIC_TEXT: [u8; 4] = *b"MEBT";

pub const FORMAT_VERSION: u8 = 1;

/// What kind of blob a header's magic identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    Numeric,
    Text,
}

impl BlobKind {
    fn magic(self) -> [u8; 4] {
        match self {
            BlobKind::Numeric => MAGIC_NUMERIC,
            BlobKind::Text => MAGIC_TEXT,
        }
    }

    fn from_magic(magic: [u8; 4]) -> MeboResult<Self> {
        if magic == MAGIC_NUMERIC {
            Ok(BlobKind::Numeric)
        } else if magic == MAGIC_TEXT {
            Ok(BlobKind::Text)
        } else {
            Err(MeboError::CorruptBlob(format!(
                "unrecognized magic bytes {magic:?}"
            )))
        }
    }
}

// ── Flags ────────────────────────────────────────────────────────────────

/// Decoded form of the header's 2-byte flags field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub endian: Endian,
    pub tags_enabled: bool,
    pub has_metric_names: bool,
    pub timestamp_encoding: TimestampEncoding,
    pub value_encoding: ValueEncoding,
    pub timestamp_compression: CompressionKind,
    pub value_compression: CompressionKind,
}

impl Flags {
    fn pack(self) -> u16 {
        let mut bits: u16 = 0;
        bits |= self.endian.flag_bit() as u16;
        bits |= (self.tags_enabled as u16) << 1;
        bits |= (self.has_metric_names as u16) << 2;
        bits |= (self.timestamp_encoding.tag() as u16) << 3;
        bits |= (self.value_encoding.tag() as u16) << 5;
        bits |= (self.timestamp_compression.tag() as u16) << 7;
        bits |= (self.value_compression.tag() as u16) << 11;
        bits
    }

    fn unpack(bits: u16) -> MeboResult<Self> {
        let reserved = bits >> 15;
        if reserved != 0 {
            return Err(MeboError::CorruptBlob(
                "undefined flag bit 15 is set".to_string(),
            ));
        }
        Ok(Flags {
            endian: Endian::from_flag_bit(bits & 1 != 0),
            tags_enabled: (bits >> 1) & 1 != 0,
            has_metric_names: (bits >> 2) & 1 != 0,
            timestamp_encoding: TimestampEncoding::from_tag(((bits >> 3) & 0b11) as u8)?,
            value_encoding: ValueEncoding::from_tag(((bits >> 5) & 0b11) as u8)?,
            timestamp_compression: CompressionKind::from_tag(((bits >> 7) & 0b1111) as u8)?,
            value_compression: CompressionKind::from_tag(((bits >> 11) & 0b1111) as u8)?,
        })
    }
}

// ── Header ───────────────────────────────────────────────────────────────

/// Parsed fixed header plus the three payload section offsets it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub kind: BlobKind,
    pub flags: Flags,
    pub metric_count: u16,
    pub total_points: u32,
    pub start_time: i64,
    /// Offset of the value section, relative to blob start.
    pub value_offset: u32,
    /// Offset of the tag section, relative to blob start (meaningless if
    /// `!flags.tags_enabled`).
    pub tag_offset: u32,
    /// Offset of the name table, relative to blob start (meaningless if
    /// `!flags.has_metric_names`).
    pub name_table_offset: u32,
}

impl Header {
    pub fn write(&self, out: &mut Vec<u8>) {
        let base = out.len();
        out.resize(base + HEADER_LEN, 0);
        let e = self.flags.endian;
        out[base..base + 4].copy_from_slice(&self.kind.magic());
        out[base + 4] = FORMAT_VERSION;
        e.write_u16(out, base + 5, self.flags.pack());
        e.write_u16(out, base + 7, self.metric_count);
        e.write_u32(out, base + 9, self.total_points);
        e.write_i64(out, base + 13, self.start_time);
        e.write_u32(out, base + 21, self.value_offset);
        e.write_u32(out, base + 25, self.tag_offset);
        e.write_u32(out, base + 29, self.name_table_offset);
        // bytes [33..40) reserved, left zeroed.
    }

    pub fn read(bytes: &[u8]) -> MeboResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(MeboError::CorruptBlob(format!(
                "blob shorter than header: {} bytes",
                bytes.len()
            )));
        }
        let magic: [u8; 4] = bytes[0..4].try_into().unwrap();
        let kind = BlobKind::from_magic(magic)?;
        let version = bytes[4];
        if version != FORMAT_VERSION {
            return Err(MeboError::CorruptBlob(format!(
                "unsupported format version {version}"
            )));
        }
        // Flags' endianness bit governs every multi-byte field after it,
        // including the flags field itself, so peek both byte orders' u16
        // and pick the one with no undefined high bit set... instead, the
        // endianness bit lives in the low bit of byte 5, which reads
        // identically under either byte order (it's a single byte's low
        // bit), so we can decode byte 5 alone first.
        let endian = Endian::from_flag_bit(bytes[5] & 1 != 0);
        let flags_bits = endian.read_u16(bytes, 5);
        let flags = Flags::unpack(flags_bits)?;
        let metric_count = endian.read_u16(bytes, 7);
        let total_points = endian.read_u32(bytes, 9);
        let start_time = endian.read_i64(bytes, 13);
        let value_offset = endian.read_u32(bytes, 21);
        let tag_offset = endian.read_u32(bytes, 25);
        let name_table_offset = endian.read_u32(bytes, 29);
        Ok(Header {
            kind,
            flags,
            metric_count,
            total_points,
            start_time,
            value_offset,
            tag_offset,
            name_table_offset,
        })
    }
}

// ── Index table ──────────────────────────────────────────────────────────

/// One metric's entry in the index table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub metric_id: u64,
    /// Offset of this record's first point within the decompressed value
    /// (and, by 1:1 correspondence, timestamp/tag) stream, measured in points.
    pub first_point_offset: u32,
    pub point_count: u32,
}

impl IndexEntry {
    pub fn write(&self, endian: Endian, out: &mut Vec<u8>) {
        let base = out.len();
        out.resize(base + INDEX_ENTRY_LEN, 0);
        endian.write_u64(out, base, self.metric_id);
        endian.write_u32(out, base + 8, self.first_point_offset);
        endian.write_u32(out, base + 12, self.point_count);
    }

    pub fn read(endian: Endian, bytes: &[u8]) -> Self {
        IndexEntry {
            metric_id: endian.read_u64(bytes, 0),
            first_point_offset: endian.read_u32(bytes, 8),
            point_count: endian.read_u32(bytes, 12),
        }
    }
}

pub fn index_table_len(metric_count: usize) -> usize {
    metric_count * INDEX_ENTRY_LEN
}

pub fn write_index_table(endian: Endian, entries: &[IndexEntry], out: &mut Vec<u8>) {
    for entry in entries {
        entry.write(endian, out);
    }
}

pub fn read_index_table(endian: Endian, bytes: &[u8], metric_count: usize) -> MeboResult<Vec<IndexEntry>> {
    let needed = index_table_len(metric_count);
    let table = bytes
        .get(..needed)
        .ok_or_else(|| MeboError::CorruptBlob("index table truncated".to_string()))?;
    Ok((0..metric_count)
        .map(|i| IndexEntry::read(endian, &table[i * INDEX_ENTRY_LEN..]))
        .collect())
}

// ── CRC trailer ──────────────────────────────────────────────────────────

/// Computes the CRC32 over `index + payloads` (everything after the header,
/// excluding the trailer itself).
pub fn compute_crc(index_and_payloads: &[u8]) -> u32 {
    crate::crc::checksum(index_and_payloads)
}

pub fn write_crc(endian: Endian, crc: u32, out: &mut Vec<u8>) {
    let base = out.len();
    out.resize(base + CRC_LEN, 0);
    endian.write_u32(out, base, crc);
}

/// Validates the trailing CRC32 of a complete blob against the bytes between
/// the header and the trailer.
pub fn validate_crc(endian: Endian, bytes: &[u8]) -> MeboResult<()> {
    if bytes.len() < HEADER_LEN + CRC_LEN {
        return Err(MeboError::CorruptBlob("blob too short for CRC trailer".to_string()));
    }
    let body_end = bytes.len() - CRC_LEN;
    let stored = endian.read_u32(bytes, body_end);
    let actual = compute_crc(&bytes[HEADER_LEN..body_end]);
    if stored != actual {
        return Err(MeboError::CorruptBlob(format!(
            "CRC mismatch: stored {stored:#010x}, computed {actual:#010x}"
        )));
    }
    Ok(())
}

// ── Name table ───────────────────────────────────────────────────────────

/// Writes the collision-fallback name table: `id (8B) | varint(len) | utf8`
/// per entry, back to back. The entry count is implicit (the section runs
/// to the CRC trailer), not declared, since the header already carries the
/// index's metric count as an upper bound on plausible entries.
pub fn write_name_table(endian: Endian, entries: &[(u64, &str)], out: &mut Vec<u8>) {
    for &(id, name) in entries {
        let base = out.len();
        out.resize(base + 8, 0);
        endian.write_u64(out, base, id);
        crate::varint::write_uvarint(out, name.len() as u64);
        out.extend_from_slice(name.as_bytes());
    }
}

pub fn read_name_table(endian: Endian, bytes: &[u8]) -> MeboResult<Vec<(u64, String)>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        if pos + 8 > bytes.len() {
            return Err(MeboError::CorruptBlob("truncated name table entry id".to_string()));
        }
        let id = endian.read_u64(bytes, pos);
        pos += 8;
        let (len, consumed) = crate::varint::read_uvarint(bytes, pos)
            .ok_or_else(|| MeboError::CorruptBlob("truncated name table length".to_string()))?;
        pos += consumed;
        let end = pos
            .checked_add(len as usize)
            .ok_or_else(|| MeboError::CorruptBlob("name table length overflow".to_string()))?;
        let name_bytes = bytes
            .get(pos..end)
            .ok_or_else(|| MeboError::CorruptBlob("name table entry out of bounds".to_string()))?;
        let name = std::str::from_utf8(name_bytes)
            .map_err(|_| MeboError::CorruptBlob("invalid utf-8 in name table".to_string()))?
            .to_string();
        out.push((id, name));
        pos = end;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header(kind: BlobKind, endian: Endian) -> Header {
        Header {
            kind,
            flags: Flags {
                endian,
                tags_enabled: true,
                has_metric_names: true,
                timestamp_encoding: TimestampEncoding::Delta,
                value_encoding: ValueEncoding::Gorilla,
                timestamp_compression: CompressionKind::Zstd,
                value_compression: CompressionKind::Lz4,
            },
            metric_count: 3,
            total_points: 1000,
            start_time: 1_700_000_000_000_000,
            value_offset: 128,
            tag_offset: 256,
            name_table_offset: 512,
        }
    }

    #[test]
    fn header_roundtrip_both_kinds_and_endians() {
        for kind in [BlobKind::Numeric, BlobKind::Text] {
            for endian in [Endian::Little, Endian::Big] {
                let header = sample_header(kind, endian);
                let mut buf = Vec::new();
                header.write(&mut buf);
                assert_eq!(buf.len(), HEADER_LEN);
                let parsed = Header::read(&buf).unwrap();
                assert_eq!(parsed, header);
            }
        }
    }

    #[test]
    fn unknown_magic_is_corrupt_blob() {
        let mut buf = vec![0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(b"XXXX");
        assert!(matches!(Header::read(&buf), Err(MeboError::CorruptBlob(_))));
    }

    #[test]
    fn unsupported_version_is_corrupt_blob() {
        let header = sample_header(BlobKind::Numeric, Endian::Little);
        let mut buf = Vec::new();
        header.write(&mut buf);
        buf[4] = 0xFF;
        assert!(matches!(Header::read(&buf), Err(MeboError::CorruptBlob(_))));
    }

    #[test]
    fn undefined_flag_bit_is_corrupt_blob() {
        let header = sample_header(BlobKind::Numeric, Endian::Little);
        let mut buf = Vec::new();
        header.write(&mut buf);
        buf[6] |= 0x80; // bit 15 of the little-endian flags field
        assert!(matches!(Header::read(&buf), Err(MeboError::CorruptBlob(_))));
    }

    #[test]
    fn truncated_header_is_corrupt_blob() {
        let buf = vec![0u8; HEADER_LEN - 1];
        assert!(matches!(Header::read(&buf), Err(MeboError::CorruptBlob(_))));
    }

    #[test]
    fn index_table_roundtrip() {
        let entries = vec![
            IndexEntry { metric_id: 0xAABB_CCDD_EEFF_0011, first_point_offset: 7, point_count: 10 },
            IndexEntry { metric_id: 0x1122_3344_5566_7788, first_point_offset: 17, point_count: 5 },
        ];
        for endian in [Endian::Little, Endian::Big] {
            let mut buf = Vec::new();
            write_index_table(endian, &entries, &mut buf);
            assert_eq!(buf.len(), index_table_len(entries.len()));
            let parsed = read_index_table(endian, &buf, entries.len()).unwrap();
            assert_eq!(parsed, entries);
        }
    }

    #[test]
    fn truncated_index_table_is_corrupt_blob() {
        let buf = vec![0u8; INDEX_ENTRY_LEN - 1];
        assert!(read_index_table(Endian::Little, &buf, 1).is_err());
    }

    #[test]
    fn crc_validates_and_detects_corruption() {
        let endian = Endian::Little;
        let body = b"index and payload bytes".to_vec();
        let crc = compute_crc(&body);
        let mut blob = vec![0u8; HEADER_LEN];
        blob.extend_from_slice(&body);
        write_crc(endian, crc, &mut blob);
        validate_crc(endian, &blob).unwrap();

        let corrupt_idx = HEADER_LEN + 3;
        blob[corrupt_idx] ^= 0xFF;
        assert!(matches!(validate_crc(endian, &blob), Err(MeboError::CorruptBlob(_))));
    }

    #[test]
    fn name_table_roundtrip() {
        let entries = vec![(1u64, "cpu.load"), (2u64, "mem.used"), (3u64, "")];
        for endian in [Endian::Little, Endian::Big] {
            let mut buf = Vec::new();
            write_name_table(endian, &entries, &mut buf);
            let parsed = read_name_table(endian, &buf).unwrap();
            let expected: Vec<(u64, String)> =
                entries.iter().map(|&(id, n)| (id, n.to_string())).collect();
            assert_eq!(parsed, expected);
        }
    }

    #[test]
    fn empty_name_table_roundtrips_to_empty_vec() {
        assert_eq!(read_name_table(Endian::Little, &[]).unwrap(), Vec::new());
    }

    #[test]
    fn truncated_name_table_is_corrupt_blob() {
        let mut buf = Vec::new();
        write_name_table(Endian::Little, &[(7u64, "abc")], &mut buf);
        buf.truncate(buf.len() - 1);
        assert!(matches!(read_name_table(Endian::Little, &buf), Err(MeboError::CorruptBlob(_))));
    }
}
