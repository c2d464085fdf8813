//! Numeric encoder (C8): the `Fresh -> MetricOpen -> Fresh -> ... -> Finished`
//! state machine that produces a numeric blob.
//!
//! `Finished` is not a variant anywhere in this module: `finish` takes `self`
//! by value, so the type system itself makes a second `finish()` call
//! impossible rather than needing a runtime flag for it.

use std::collections::HashMap;

use crate::codec::CompressionKind;
use crate::column::{text, timestamp, value};
use crate::column::timestamp::TimestampEncoding;
use crate::column::value::ValueEncoding;
use crate::endian::Endian;
use crate::error::{MeboError, MeboResult};
use crate::hash::MetricRef;
use crate::section::{self, Header, HEADER_LEN};

/// All recognized encoder settings (spec §6's configuration table), a plain
/// `Copy` struct in the style of the teacher's `Preferences`/`FrameInfo`
/// builder structs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderOptions {
    pub endianness: Endian,
    pub timestamp_encoding: TimestampEncoding,
    pub value_encoding: ValueEncoding,
    pub timestamp_compression: CompressionKind,
    pub value_compression: CompressionKind,
    pub tags_enabled: bool,
}

impl Default for EncoderOptions {
    /// Spec §4.8 defaults: little-endian, delta, gorilla, no compression,
    /// tags disabled.
    fn default() -> Self {
        Self {
            endianness: Endian::Little,
            timestamp_encoding: TimestampEncoding::Delta,
            value_encoding: ValueEncoding::Gorilla,
            timestamp_compression: CompressionKind::None,
            value_compression: CompressionKind::None,
            tags_enabled: false,
        }
    }
}

impl EncoderOptions {
    pub fn with_endianness(mut self, endianness: Endian) -> Self {
        self.endianness = endianness;
        self
    }

    pub fn with_timestamp_encoding(mut self, encoding: TimestampEncoding) -> Self {
        self.timestamp_encoding = encoding;
        self
    }

    pub fn with_value_encoding(mut self, encoding: ValueEncoding) -> Self {
        self.value_encoding = encoding;
        self
    }

    pub fn with_timestamp_compression(mut self, compression: CompressionKind) -> Self {
        self.timestamp_compression = compression;
        self
    }

    pub fn with_value_compression(mut self, compression: CompressionKind) -> Self {
        self.value_compression = compression;
        self
    }

    pub fn with_tags_enabled(mut self, enabled: bool) -> Self {
        self.tags_enabled = enabled;
        self
    }
}

/// Two `start_metric` calls against the same hashed ID are a genuine name
/// collision (both names known and different), not a duplicate, only when
/// both sides actually carry a name; an ID-only metric can never be proven
/// distinct from one already holding that ID.
fn names_collide(existing: &Option<String>, new: &Option<String>) -> bool {
    matches!((existing, new), (Some(a), Some(b)) if a != b)
}

struct PendingRecord {
    metric_id: u64,
    declared_count: u32,
    timestamps: Vec<i64>,
    values: Vec<f64>,
    tags: Vec<String>,
}

/// Produces one numeric blob from a sequence of `start_metric` /
/// `add_data_point` / `end_metric` calls, terminated by `finish`.
pub struct NumericEncoder {
    start_time: i64,
    options: EncoderOptions,
    pending: Option<PendingRecord>,
    first_name: HashMap<u64, Option<String>>,
    name_log: Vec<(u64, Option<String>)>,
    has_collision: bool,
    entries: Vec<section::IndexEntry>,
    running_point_offset: u32,
    total_points: u64,
    ts_section: crate::bufpool::Buffer,
    val_section: crate::bufpool::Buffer,
    all_tags: Vec<String>,
}

impl NumericEncoder {
    /// Opens a new encoder, acquiring its timestamp/value staging buffers
    /// from the blob pool (spec §3: "acquired on open"); `finish` releases
    /// them back.
    pub fn new(start_time: i64, options: EncoderOptions) -> Self {
        Self {
            start_time,
            options,
            pending: None,
            first_name: HashMap::new(),
            name_log: Vec::new(),
            has_collision: false,
            entries: Vec::new(),
            running_point_offset: 0,
            total_points: 0,
            ts_section: crate::bufpool::blob_pool().acquire(),
            val_section: crate::bufpool::blob_pool().acquire(),
            all_tags: Vec::new(),
        }
    }

    /// Opens a new metric record. `metric` may be a raw ID or a name (names
    /// are hashed immediately); `count` is the exact number of
    /// `add_data_point` calls that must follow before `end_metric`.
    pub fn start_metric<'a>(&mut self, metric: impl Into<MetricRef<'a>>, count: u32) -> MeboResult<()> {
        if self.pending.is_some() {
            return Err(MeboError::InvalidArgument(
                "start_metric called while a metric is already open".to_string(),
            ));
        }
        if count == 0 {
            return Err(MeboError::InvalidArgument(
                "start_metric count must be at least 1".to_string(),
            ));
        }

        let (id, name) = metric.into().resolve();
        let name_owned = name.map(str::to_string);

        if let Some(existing) = self.first_name.get(&id) {
            let collides = names_collide(existing, &name_owned);
            if !collides {
                return Err(MeboError::InvalidArgument(format!(
                    "duplicate metric id {id:#x}"
                )));
            }
            self.has_collision = true;
            tracing::warn!(metric_id = id, "metric name collision, enabling name table");
        } else {
            self.first_name.insert(id, name_owned.clone());
        }

        if self.entries.len() >= u16::MAX as usize {
            return Err(MeboError::LimitExceeded(format!(
                "metric count would exceed {}",
                u16::MAX
            )));
        }
        let new_total = self.total_points + count as u64;
        if new_total > u32::MAX as u64 {
            return Err(MeboError::LimitExceeded(format!(
                "total points would exceed {}",
                u32::MAX
            )));
        }

        self.name_log.push((id, name_owned));
        self.entries.push(section::IndexEntry {
            metric_id: id,
            first_point_offset: self.running_point_offset,
            point_count: count,
        });
        self.running_point_offset += count;
        self.total_points = new_total;
        self.pending = Some(PendingRecord {
            metric_id: id,
            declared_count: count,
            timestamps: Vec::with_capacity(count as usize),
            values: Vec::with_capacity(count as usize),
            tags: Vec::new(),
        });
        Ok(())
    }

    /// Appends one point to the currently open record. `tag` is ignored
    /// (not stored) unless `tags_enabled` is set in the encoder's options.
    pub fn add_data_point(&mut self, ts: i64, value: f64, tag: &str) -> MeboResult<()> {
        let pending = self.pending.as_mut().ok_or_else(|| {
            MeboError::InvalidArgument("add_data_point called with no open metric".to_string())
        })?;
        if pending.timestamps.len() as u32 >= pending.declared_count {
            return Err(MeboError::InvalidArgument(format!(
                "metric {:#x} received more than its declared {} points",
                pending.metric_id, pending.declared_count
            )));
        }
        if let Some(&last) = pending.timestamps.last() {
            if ts <= last {
                return Err(MeboError::InvalidArgument(format!(
                    "timestamp {ts} is not strictly greater than previous {last}"
                )));
            }
        }
        pending.timestamps.push(ts);
        pending.values.push(value);
        if self.options.tags_enabled {
            pending.tags.push(tag.to_string());
        }
        Ok(())
    }

    /// Closes the currently open record, validating its declared count was
    /// honored exactly, and flushes it into the per-blob column buffers.
    pub fn end_metric(&mut self) -> MeboResult<()> {
        let pending = self.pending.take().ok_or_else(|| {
            MeboError::InvalidArgument("end_metric called with no open metric".to_string())
        })?;
        if pending.timestamps.len() as u32 != pending.declared_count {
            return Err(MeboError::InvalidArgument(format!(
                "metric {:#x} declared {} points but received {}",
                pending.metric_id,
                pending.declared_count,
                pending.timestamps.len()
            )));
        }

        let ts_bytes = match self.options.timestamp_encoding {
            TimestampEncoding::Raw => timestamp::encode_raw(self.options.endianness, &pending.timestamps),
            TimestampEncoding::Delta => timestamp::encode_delta(self.start_time, &pending.timestamps),
        };
        let val_bytes = match self.options.value_encoding {
            ValueEncoding::Raw => value::encode_raw(self.options.endianness, &pending.values),
            ValueEncoding::Gorilla => value::encode_gorilla(&pending.values),
        };
        self.ts_section.append(&ts_bytes);
        self.val_section.append(&val_bytes);
        if self.options.tags_enabled {
            self.all_tags.extend(pending.tags);
        }
        Ok(())
    }

    /// Compresses each column, assembles the blob, computes its CRC, and
    /// returns the finished byte sequence. Consumes the encoder: there is no
    /// way to call `finish` twice or resume encoding afterward.
    pub fn finish(self) -> MeboResult<Vec<u8>> {
        if self.pending.is_some() {
            return Err(MeboError::InvalidArgument(
                "finish called with an open metric".to_string(),
            ));
        }
        let endian = self.options.endianness;
        let metric_count = self.entries.len() as u16;
        let total_points = self.total_points as u32;

        let ts_section_bytes = self.ts_section.bytes().to_vec();
        let val_section_bytes = self.val_section.bytes().to_vec();
        crate::bufpool::blob_pool().release(self.ts_section);
        crate::bufpool::blob_pool().release(self.val_section);

        let ts_compressed = self.options.timestamp_compression.compress(ts_section_bytes)?;
        let val_compressed = self.options.value_compression.compress(val_section_bytes)?;

        let (tag_offsets, tag_data) = if self.options.tags_enabled {
            let refs: Vec<&str> = self.all_tags.iter().map(String::as_str).collect();
            let (data, offsets) = text::encode(endian, &refs);
            (offsets, data)
        } else {
            (Vec::new(), Vec::new())
        };

        let has_metric_names = self.has_collision;
        let name_table_bytes = if has_metric_names {
            // One entry per index slot (empty string if that metric was
            // never named), so the table stays positionally aligned with the
            // index table even when an unrelated metric in the same blob is
            // ID-only; see numeric::blob::decode's alignment check.
            let entries: Vec<(u64, &str)> = self
                .name_log
                .iter()
                .map(|(id, name)| (*id, name.as_deref().unwrap_or("")))
                .collect();
            let mut buf = Vec::new();
            section::write_name_table(endian, &entries, &mut buf);
            buf
        } else {
            Vec::new()
        };

        let index_start = HEADER_LEN;
        let ts_start = index_start + section::index_table_len(metric_count as usize);
        let val_start = ts_start + ts_compressed.len();
        let tag_start = val_start + val_compressed.len();
        let tag_section_len = tag_offsets.len() + tag_data.len();
        let name_table_start = tag_start + tag_section_len;

        let header = Header {
            kind: section::BlobKind::Numeric,
            flags: section::Flags {
                endian,
                tags_enabled: self.options.tags_enabled,
                has_metric_names,
                timestamp_encoding: self.options.timestamp_encoding,
                value_encoding: self.options.value_encoding,
                timestamp_compression: self.options.timestamp_compression,
                value_compression: self.options.value_compression,
            },
            metric_count,
            total_points,
            start_time: self.start_time,
            value_offset: val_start as u32,
            tag_offset: tag_start as u32,
            name_table_offset: name_table_start as u32,
        };

        let mut blob = Vec::new();
        header.write(&mut blob);
        section::write_index_table(endian, &self.entries, &mut blob);
        blob.extend_from_slice(&ts_compressed);
        blob.extend_from_slice(&val_compressed);
        if self.options.tags_enabled {
            blob.extend_from_slice(&tag_offsets);
            blob.extend_from_slice(&tag_data);
        }
        blob.extend_from_slice(&name_table_bytes);

        let crc = section::compute_crc(&blob[HEADER_LEN..]);
        section::write_crc(endian, crc, &mut blob);

        tracing::debug!(
            metric_count,
            total_points,
            bytes = blob.len(),
            "numeric blob finished"
        );

        Ok(blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> u64 {
        crate::hash::metric_id(name)
    }

    #[test]
    fn rejects_zero_count() {
        let mut enc = NumericEncoder::new(0, EncoderOptions::default());
        assert!(matches!(
            enc.start_metric("a", 0),
            Err(MeboError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_duplicate_metric_id_same_name() {
        let mut enc = NumericEncoder::new(0, EncoderOptions::default());
        enc.start_metric("a", 1).unwrap();
        enc.add_data_point(1, 1.0, "").unwrap();
        enc.end_metric().unwrap();
        assert!(matches!(
            enc.start_metric("a", 1),
            Err(MeboError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_non_monotonic_timestamps() {
        let mut enc = NumericEncoder::new(0, EncoderOptions::default());
        enc.start_metric("a", 2).unwrap();
        enc.add_data_point(10, 1.0, "").unwrap();
        assert!(matches!(
            enc.add_data_point(10, 2.0, ""),
            Err(MeboError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_exceeding_declared_count() {
        let mut enc = NumericEncoder::new(0, EncoderOptions::default());
        enc.start_metric("a", 1).unwrap();
        enc.add_data_point(1, 1.0, "").unwrap();
        assert!(matches!(
            enc.add_data_point(2, 2.0, ""),
            Err(MeboError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_end_metric_with_short_count() {
        let mut enc = NumericEncoder::new(0, EncoderOptions::default());
        enc.start_metric("a", 2).unwrap();
        enc.add_data_point(1, 1.0, "").unwrap();
        assert!(matches!(
            enc.end_metric(),
            Err(MeboError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_finish_with_open_metric() {
        let mut enc = NumericEncoder::new(0, EncoderOptions::default());
        enc.start_metric("a", 1).unwrap();
        assert!(matches!(enc.finish(), Err(MeboError::InvalidArgument(_))));
    }

    #[test]
    fn rejects_metric_count_over_cap() {
        let mut enc = NumericEncoder::new(0, EncoderOptions::default());
        for i in 0..u16::MAX {
            enc.start_metric(i as u64, 1).unwrap();
            enc.add_data_point(1, 1.0, "").unwrap();
            enc.end_metric().unwrap();
        }
        assert!(matches!(
            enc.start_metric(u16::MAX as u64 + 1, 1),
            Err(MeboError::LimitExceeded(_))
        ));
    }

    #[test]
    fn rejects_start_metric_count_exceeding_total_point_cap() {
        let mut enc = NumericEncoder::new(0, EncoderOptions::default());
        // A single declared count above the 2^32-1 cap is rejected at
        // start_metric time (the "friendlier" choice per spec's open question).
        assert!(matches!(
            enc.start_metric(1u64, u32::MAX),
            Err(MeboError::LimitExceeded(_))
        ));
    }

    #[test]
    fn smallest_numeric_blob_roundtrips() {
        let start = 1_700_000_000_000_000i64;
        let mut enc = NumericEncoder::new(start, EncoderOptions::default());
        enc.start_metric("a", 3).unwrap();
        enc.add_data_point(start + 1_000_000, 1.0, "").unwrap();
        enc.add_data_point(start + 2_000_000, 1.0, "").unwrap();
        enc.add_data_point(start + 3_000_000, 2.0, "").unwrap();
        enc.end_metric().unwrap();
        let bytes = enc.finish().unwrap();

        let blob = crate::numeric::decode(&bytes).unwrap();
        assert_eq!(blob.len(id("a")), (3, true));
        assert_eq!(blob.value_at(id("a"), 2), (2.0, true));
        assert_eq!(blob.value_at(id("a"), 3), (0.0, false));
    }

    #[test]
    fn names_collide_only_when_both_names_are_known_and_differ() {
        let a = Some("cpu.load".to_string());
        let b = Some("mem.used".to_string());
        assert!(names_collide(&a, &b));
        assert!(!names_collide(&a, &a.clone()));
        assert!(!names_collide(&a, &None));
        assert!(!names_collide(&None, &b));
    }
}
