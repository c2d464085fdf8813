//! Text encoder (C10): the same `Fresh -> MetricOpen -> Fresh -> ... ->
//! Finished` state machine as [`crate::numeric::NumericEncoder`], with
//! string-valued points instead of floats.
//!
//! Grounded directly on `numeric::encoder`: every invariant (monotonic
//! timestamps, exact declared counts, collision/duplicate handling, the
//! metric-count and total-point caps) is identical, so this module mirrors
//! its shape rather than reinventing it. The only structural difference is
//! the value column itself — length-prefixed strings via
//! [`crate::column::text`] instead of raw/Gorilla floats — so there is no
//! `value_encoding` setting here.

use std::collections::HashMap;

use crate::codec::CompressionKind;
use crate::column::{text, timestamp};
use crate::column::timestamp::TimestampEncoding;
use crate::endian::Endian;
use crate::error::{MeboError, MeboResult};
use crate::hash::MetricRef;
use crate::section::{self, Header, HEADER_LEN};

/// All recognized text-encoder settings (spec §4.10's defaults override
/// two of the numeric defaults: delta timestamps stay the same, but value
/// compression defaults to zstd since text payloads compress well).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextEncoderOptions {
    pub endianness: Endian,
    pub timestamp_encoding: TimestampEncoding,
    pub timestamp_compression: CompressionKind,
    pub value_compression: CompressionKind,
    pub tags_enabled: bool,
}

impl Default for TextEncoderOptions {
    fn default() -> Self {
        Self {
            endianness: Endian::Little,
            timestamp_encoding: TimestampEncoding::Delta,
            timestamp_compression: CompressionKind::None,
            value_compression: CompressionKind::Zstd,
            tags_enabled: false,
        }
    }
}

impl TextEncoderOptions {
    pub fn with_endianness(mut self, endianness: Endian) -> Self {
        self.endianness = endianness;
        self
    }

    pub fn with_timestamp_encoding(mut self, encoding: TimestampEncoding) -> Self {
        self.timestamp_encoding = encoding;
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

fn names_collide(existing: &Option<String>, new: &Option<String>) -> bool {
    matches!((existing, new), (Some(a), Some(b)) if a != b)
}

struct PendingRecord {
    metric_id: u64,
    declared_count: u32,
    timestamps: Vec<i64>,
    values: Vec<String>,
    tags: Vec<String>,
}

/// Produces one text blob from a sequence of `start_metric` /
/// `add_data_point` / `end_metric` calls, terminated by `finish`.
pub struct TextEncoder {
    start_time: i64,
    options: TextEncoderOptions,
    pending: Option<PendingRecord>,
    first_name: HashMap<u64, Option<String>>,
    name_log: Vec<(u64, Option<String>)>,
    has_collision: bool,
    entries: Vec<section::IndexEntry>,
    running_point_offset: u32,
    total_points: u64,
    ts_section: crate::bufpool::Buffer,
    all_values: Vec<String>,
    all_tags: Vec<String>,
}

impl TextEncoder {
    /// Opens a new encoder, acquiring its timestamp staging buffer from the
    /// blob pool (spec §3: "acquired on open"); `finish` releases it back.
    pub fn new(start_time: i64, options: TextEncoderOptions) -> Self {
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
            all_values: Vec::new(),
            all_tags: Vec::new(),
        }
    }

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
    /// unless `tags_enabled` is set in the encoder's options.
    pub fn add_data_point(&mut self, ts: i64, value: &str, tag: &str) -> MeboResult<()> {
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
        pending.values.push(value.to_string());
        if self.options.tags_enabled {
            pending.tags.push(tag.to_string());
        }
        Ok(())
    }

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
        self.ts_section.append(&ts_bytes);
        self.all_values.extend(pending.values);
        if self.options.tags_enabled {
            self.all_tags.extend(pending.tags);
        }
        Ok(())
    }

    /// Compresses each column, assembles the blob, computes its CRC, and
    /// returns the finished byte sequence. Consumes the encoder.
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
        crate::bufpool::blob_pool().release(self.ts_section);
        let ts_compressed = self.options.timestamp_compression.compress(ts_section_bytes)?;

        let value_refs: Vec<&str> = self.all_values.iter().map(String::as_str).collect();
        let (value_data, value_offsets) = text::encode(endian, &value_refs);
        let mut value_section = crate::bufpool::blob_pool().acquire();
        value_section.append(&value_offsets);
        value_section.append(&value_data);
        let value_section_bytes = value_section.bytes().to_vec();
        crate::bufpool::blob_pool().release(value_section);
        let value_compressed = self.options.value_compression.compress(value_section_bytes)?;

        let (tag_offsets, tag_data) = if self.options.tags_enabled {
            let refs: Vec<&str> = self.all_tags.iter().map(String::as_str).collect();
            text::encode(endian, &refs)
        } else {
            (Vec::new(), Vec::new())
        };

        let has_metric_names = self.has_collision;
        let name_table_bytes = if has_metric_names {
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
        let tag_start = val_start + value_compressed.len();
        let tag_section_len = tag_offsets.len() + tag_data.len();
        let name_table_start = tag_start + tag_section_len;

        let header = Header {
            kind: section::BlobKind::Text,
            flags: section::Flags {
                endian,
                tags_enabled: self.options.tags_enabled,
                has_metric_names,
                timestamp_encoding: self.options.timestamp_encoding,
                // Text blobs have no Raw/Gorilla choice; `Raw` is a fixed
                // placeholder tag, never interpreted for this blob kind.
                value_encoding: crate::column::value::ValueEncoding::Raw,
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
        blob.extend_from_slice(&value_compressed);
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
            "text blob finished"
        );

        Ok(blob)
    }
}
