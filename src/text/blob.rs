//! Text decoder and blob (C10): `decode(bytes) -> TextBlob`.
//!
//! Mirrors [`crate::numeric::blob`] for the index/timestamp/tag machinery;
//! the value column is simpler here, since length-prefixed strings address
//! directly via their offset table (no walk needed the way delta-timestamp
//! or Gorilla-value decoding needs one), so there is no value-boundary
//! cache. See that module's doc comment for the infallible-accessor
//! rationale, which applies identically here.

use std::sync::OnceLock;

use crate::column::timestamp::{self, TimestampEncoding};
use crate::column::text;
use crate::error::{MeboError, MeboResult};
use crate::hash::metric_id;
use crate::section::{self, BlobKind, Header, CRC_LEN, HEADER_LEN};

const INVARIANT: &str = "column data inconsistent with a CRC-validated blob";

pub struct TextBlob {
    bytes: Vec<u8>,
    header: Header,
    entries: Vec<section::IndexEntry>,
    names: Vec<String>,
    ts_range: (usize, usize),
    val_range: (usize, usize),
    tag_range: Option<(usize, usize)>,
    ts_cache: OnceLock<crate::bufpool::Buffer>,
    val_cache: OnceLock<crate::bufpool::Buffer>,
    ts_boundaries: OnceLock<Vec<(usize, usize)>>,
}

impl Drop for TextBlob {
    /// Mirrors `NumericBlob`'s release of its decompressed-column caches
    /// back to the blob-set pool they were acquired from.
    fn drop(&mut self) {
        if let Some(buf) = self.ts_cache.take() {
            crate::bufpool::blob_set_pool().release(buf);
        }
        if let Some(buf) = self.val_cache.take() {
            crate::bufpool::blob_set_pool().release(buf);
        }
    }
}

pub fn decode(bytes: &[u8]) -> MeboResult<TextBlob> {
    let header = Header::read(bytes)?;
    if header.kind != BlobKind::Text {
        return Err(MeboError::CorruptBlob(
            "expected text blob magic, found numeric blob magic".to_string(),
        ));
    }
    let endian = header.flags.endian;
    section::validate_crc(endian, bytes)?;

    let metric_count = header.metric_count as usize;
    let index_start = HEADER_LEN;
    let index_len = section::index_table_len(metric_count);
    let entries = section::read_index_table(endian, &bytes[index_start..], metric_count)?;

    let ts_start = index_start + index_len;
    let value_offset = header.value_offset as usize;
    if value_offset < ts_start || value_offset > bytes.len() {
        return Err(MeboError::CorruptBlob("value section offset out of bounds".to_string()));
    }
    let body_end = bytes
        .len()
        .checked_sub(CRC_LEN)
        .ok_or_else(|| MeboError::CorruptBlob("blob too short for CRC trailer".to_string()))?;

    let value_section_end = if header.flags.tags_enabled {
        header.tag_offset as usize
    } else if header.flags.has_metric_names {
        header.name_table_offset as usize
    } else {
        body_end
    };
    if value_section_end < value_offset || value_section_end > bytes.len() {
        return Err(MeboError::CorruptBlob("tag/name-table offset out of bounds".to_string()));
    }

    let tag_range = if header.flags.tags_enabled {
        let start = header.tag_offset as usize;
        let end = if header.flags.has_metric_names {
            header.name_table_offset as usize
        } else {
            body_end
        };
        if end < start || end > bytes.len() {
            return Err(MeboError::CorruptBlob("name-table offset out of bounds".to_string()));
        }
        Some((start, end))
    } else {
        None
    };

    let names = if header.flags.has_metric_names {
        let start = header.name_table_offset as usize;
        if body_end < start {
            return Err(MeboError::CorruptBlob("name table offset out of bounds".to_string()));
        }
        let parsed = section::read_name_table(endian, &bytes[start..body_end])?;
        if parsed.len() != entries.len() {
            return Err(MeboError::CorruptBlob(format!(
                "name table has {} entries but index has {}",
                parsed.len(),
                entries.len()
            )));
        }
        for (i, (id, _)) in parsed.iter().enumerate() {
            if *id != entries[i].metric_id {
                return Err(MeboError::CorruptBlob(
                    "name table entry does not align with index entry".to_string(),
                ));
            }
        }
        parsed.into_iter().map(|(_, name)| name).collect()
    } else {
        Vec::new()
    };

    tracing::debug!(
        metric_count,
        total_points = header.total_points,
        "text blob decoded"
    );

    Ok(TextBlob {
        bytes: bytes.to_vec(),
        header,
        entries,
        names,
        ts_range: (ts_start, value_offset),
        val_range: (value_offset, value_section_end),
        tag_range,
        ts_cache: OnceLock::new(),
        val_cache: OnceLock::new(),
        ts_boundaries: OnceLock::new(),
    })
}

impl TextBlob {
    pub fn start_time(&self) -> i64 {
        self.header.start_time
    }

    pub fn metric_count(&self) -> u16 {
        self.header.metric_count
    }

    pub fn has_metric_id(&self, id: u64) -> bool {
        self.entry_index_for_id(id).is_some()
    }

    pub fn has_metric_name(&self, name: &str) -> bool {
        self.entry_index_for_name(name).is_some()
    }

    pub fn metric_ids(&self) -> Vec<u64> {
        self.entries.iter().map(|e| e.metric_id).collect()
    }

    pub fn metric_names(&self) -> Vec<&str> {
        if self.header.flags.has_metric_names {
            self.names.iter().map(String::as_str).filter(|n| !n.is_empty()).collect()
        } else {
            Vec::new()
        }
    }

    pub fn len(&self, id: u64) -> (u32, bool) {
        match self.entry_index_for_id(id) {
            Some(i) => (self.entries[i].point_count, true),
            None => (0, false),
        }
    }

    pub fn len_by_name(&self, name: &str) -> (u32, bool) {
        match self.entry_index_for_name(name) {
            Some(i) => (self.entries[i].point_count, true),
            None => (0, false),
        }
    }

    pub fn all_timestamps(&self, id: u64) -> (Vec<i64>, bool) {
        match self.entry_index_for_id(id) {
            None => (Vec::new(), false),
            Some(i) => (self.decode_timestamps(i), true),
        }
    }

    pub fn all_timestamps_by_name(&self, name: &str) -> (Vec<i64>, bool) {
        match self.entry_index_for_name(name) {
            None => (Vec::new(), false),
            Some(i) => (self.decode_timestamps(i), true),
        }
    }

    pub fn all_values(&self, id: u64) -> (Vec<String>, bool) {
        match self.entry_index_for_id(id) {
            None => (Vec::new(), false),
            Some(i) => (self.decode_values(i), true),
        }
    }

    pub fn all_values_by_name(&self, name: &str) -> (Vec<String>, bool) {
        match self.entry_index_for_name(name) {
            None => (Vec::new(), false),
            Some(i) => (self.decode_values(i), true),
        }
    }

    pub fn all_tags(&self, id: u64) -> (Vec<String>, bool) {
        match self.entry_index_for_id(id) {
            None => (Vec::new(), false),
            Some(i) => (self.decode_tags(i), true),
        }
    }

    pub fn all_tags_by_name(&self, name: &str) -> (Vec<String>, bool) {
        match self.entry_index_for_name(name) {
            None => (Vec::new(), false),
            Some(i) => (self.decode_tags(i), true),
        }
    }

    pub fn all(&self, id: u64) -> (Vec<(i64, String, String)>, bool) {
        match self.entry_index_for_id(id) {
            None => (Vec::new(), false),
            Some(i) => (self.zip_record(i), true),
        }
    }

    pub fn all_by_name(&self, name: &str) -> (Vec<(i64, String, String)>, bool) {
        match self.entry_index_for_name(name) {
            None => (Vec::new(), false),
            Some(i) => (self.zip_record(i), true),
        }
    }

    pub fn timestamp_at(&self, id: u64, i: usize) -> (i64, bool) {
        let Some(entry_idx) = self.entry_index_for_id(id) else {
            return (0, false);
        };
        if i as u64 >= self.entries[entry_idx].point_count as u64 {
            return (0, false);
        }
        (self.timestamp_at_unchecked(entry_idx, i), true)
    }

    pub fn value_at(&self, id: u64, i: usize) -> (String, bool) {
        let Some(entry_idx) = self.entry_index_for_id(id) else {
            return (String::new(), false);
        };
        if i as u64 >= self.entries[entry_idx].point_count as u64 {
            return (String::new(), false);
        }
        (self.value_at_unchecked(entry_idx, i), true)
    }

    pub fn tag_at(&self, id: u64, i: usize) -> (String, bool) {
        let Some(entry_idx) = self.entry_index_for_id(id) else {
            return (String::new(), false);
        };
        if i as u64 >= self.entries[entry_idx].point_count as u64 {
            return (String::new(), false);
        }
        if !self.header.flags.tags_enabled {
            return (String::new(), true);
        }
        (self.tag_at_unchecked(entry_idx, i), true)
    }

    // ── Lookup ───────────────────────────────────────────────────────────

    fn entry_index_for_id(&self, id: u64) -> Option<usize> {
        self.entries.iter().position(|e| e.metric_id == id)
    }

    fn entry_index_for_name(&self, name: &str) -> Option<usize> {
        if self.header.flags.has_metric_names {
            self.names.iter().position(|n| n == name)
        } else {
            self.entry_index_for_id(metric_id(name))
        }
    }

    // ── Section access ───────────────────────────────────────────────────

    fn ts_bytes(&self) -> &[u8] {
        if let Some(b) = self.ts_cache.get() {
            return b.bytes();
        }
        let (s, e) = self.ts_range;
        let decompressed = self
            .header
            .flags
            .timestamp_compression
            .decompress(self.bytes[s..e].to_vec())
            .expect(INVARIANT);
        let mut buf = crate::bufpool::blob_set_pool().acquire();
        buf.append(&decompressed);
        let _ = self.ts_cache.set(buf);
        self.ts_cache.get().unwrap().bytes()
    }

    /// Decompressed `(offsets, data)` for the value column.
    fn value_sections(&self) -> (&[u8], &[u8]) {
        if self.val_cache.get().is_none() {
            let (s, e) = self.val_range;
            let decompressed = self
                .header
                .flags
                .value_compression
                .decompress(self.bytes[s..e].to_vec())
                .expect(INVARIANT);
            let mut buf = crate::bufpool::blob_set_pool().acquire();
            buf.append(&decompressed);
            let _ = self.val_cache.set(buf);
        }
        let whole = self.val_cache.get().unwrap().bytes();
        let offsets_len = self.header.total_points as usize * 4;
        let offsets = whole.get(..offsets_len).expect(INVARIANT);
        (offsets, &whole[offsets_len..])
    }

    fn ts_boundaries(&self) -> &[(usize, usize)] {
        if let Some(b) = self.ts_boundaries.get() {
            return b;
        }
        let bytes = self.ts_bytes();
        let mut ranges = Vec::with_capacity(self.entries.len());
        let mut cursor = 0usize;
        for e in &self.entries {
            let (_, consumed) =
                timestamp::decode_delta_all(self.header.start_time, &bytes[cursor..], e.point_count as usize)
                    .expect(INVARIANT);
            ranges.push((cursor, cursor + consumed));
            cursor += consumed;
        }
        let _ = self.ts_boundaries.set(ranges);
        self.ts_boundaries.get().unwrap()
    }

    fn ts_range_for(&self, entry_idx: usize) -> (usize, usize) {
        let e = &self.entries[entry_idx];
        match self.header.flags.timestamp_encoding {
            TimestampEncoding::Raw => {
                let start = e.first_point_offset as usize * 8;
                (start, start + e.point_count as usize * 8)
            }
            TimestampEncoding::Delta => self.ts_boundaries()[entry_idx],
        }
    }

    fn decode_timestamps(&self, entry_idx: usize) -> Vec<i64> {
        let e = self.entries[entry_idx];
        let (s, end) = self.ts_range_for(entry_idx);
        let bytes = self.ts_bytes();
        let slice = &bytes[s..end];
        match self.header.flags.timestamp_encoding {
            TimestampEncoding::Raw => timestamp::decode_raw_all(self.header.flags.endian, slice, e.point_count as usize),
            TimestampEncoding::Delta => {
                timestamp::decode_delta_all(self.header.start_time, slice, e.point_count as usize)
                    .expect(INVARIANT)
                    .0
            }
        }
    }

    fn decode_values(&self, entry_idx: usize) -> Vec<String> {
        let e = self.entries[entry_idx];
        let (offsets, data) = self.value_sections();
        (0..e.point_count as usize)
            .map(|i| {
                text::value_at(self.header.flags.endian, data, offsets, e.first_point_offset as usize + i)
                    .expect(INVARIANT)
                    .to_string()
            })
            .collect()
    }

    fn decode_tags(&self, entry_idx: usize) -> Vec<String> {
        let e = self.entries[entry_idx];
        if !self.header.flags.tags_enabled {
            return vec![String::new(); e.point_count as usize];
        }
        let (offsets, data) = self.tag_sections();
        (0..e.point_count as usize)
            .map(|i| {
                text::value_at(self.header.flags.endian, data, offsets, e.first_point_offset as usize + i)
                    .expect(INVARIANT)
                    .to_string()
            })
            .collect()
    }

    fn tag_sections(&self) -> (&[u8], &[u8]) {
        let (start, end) = self.tag_range.expect(INVARIANT);
        let section = &self.bytes[start..end];
        let offsets_len = self.header.total_points as usize * 4;
        let offsets = section.get(..offsets_len).expect(INVARIANT);
        (offsets, &section[offsets_len..])
    }

    fn timestamp_at_unchecked(&self, entry_idx: usize, i: usize) -> i64 {
        let (s, end) = self.ts_range_for(entry_idx);
        let bytes = self.ts_bytes();
        let slice = &bytes[s..end];
        match self.header.flags.timestamp_encoding {
            TimestampEncoding::Raw => timestamp::decode_raw_at(self.header.flags.endian, slice, i),
            TimestampEncoding::Delta => {
                let cursor = timestamp::DeltaCursor::new(self.header.start_time, slice);
                let count = self.entries[entry_idx].point_count as usize;
                cursor.value_at(count, i).expect(INVARIANT).expect(INVARIANT)
            }
        }
    }

    fn value_at_unchecked(&self, entry_idx: usize, i: usize) -> String {
        let e = self.entries[entry_idx];
        let (offsets, data) = self.value_sections();
        text::value_at(self.header.flags.endian, data, offsets, e.first_point_offset as usize + i)
            .expect(INVARIANT)
            .to_string()
    }

    fn tag_at_unchecked(&self, entry_idx: usize, i: usize) -> String {
        let e = self.entries[entry_idx];
        let (offsets, data) = self.tag_sections();
        text::value_at(self.header.flags.endian, data, offsets, e.first_point_offset as usize + i)
            .expect(INVARIANT)
            .to_string()
    }

    fn zip_record(&self, entry_idx: usize) -> Vec<(i64, String, String)> {
        let ts = self.decode_timestamps(entry_idx);
        let vals = self.decode_values(entry_idx);
        let tags = self.decode_tags(entry_idx);
        ts.into_iter().zip(vals).zip(tags).map(|((t, v), g)| (t, v, g)).collect()
    }
}
