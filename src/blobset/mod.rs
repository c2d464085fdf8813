//! Blob set and materialization (C11): a sorted collection of numeric and
//! text blobs behind one per-metric view, plus an eager flattening into
//! O(1)-indexable arrays.
//!
//! `BlobSet` keeps two vectors (numeric, text) each sorted ascending by
//! `start_time`, mirroring the teacher's frame-sequence handling in
//! `file.rs` (a vector of frames consumed/produced in file order) adapted
//! here to a vector sorted and searched by a timestamp key instead of
//! walked strictly sequentially.

mod materialize;

use crate::error::MeboResult;
use crate::hash::MetricRef;
use crate::numeric::{self, NumericBlob};
use crate::text::{self, TextBlob};

pub use materialize::{MaterializedBlobSet, MaterializedNumericMetric, MaterializedTextMetric};

/// Which blob kind a metric ID belongs to in a given `BlobSet`. A metric is
/// one kind across every blob that contains it (spec invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Numeric,
    Text,
}

pub struct BlobSet {
    numeric: Vec<NumericBlob>,
    text: Vec<TextBlob>,
}

impl BlobSet {
    pub fn new() -> Self {
        Self { numeric: Vec::new(), text: Vec::new() }
    }

    /// Builds a set from already-decoded blobs, sorting each vector
    /// ascending by `start_time`. Mirrors `new_blob_set(numerics, texts)`
    /// from the public interface contract.
    pub fn from_blobs(mut numeric: Vec<NumericBlob>, mut text: Vec<TextBlob>) -> Self {
        numeric.sort_by_key(|b| b.start_time());
        text.sort_by_key(|b| b.start_time());
        Self { numeric, text }
    }

    /// Decodes and inserts a numeric blob, keeping `numeric` sorted by
    /// `start_time`. A corrupt blob fails the insert, not just that blob.
    pub fn add_numeric_blob(&mut self, bytes: &[u8]) -> MeboResult<()> {
        let blob = numeric::decode(bytes)?;
        let pos = self.numeric.partition_point(|b| b.start_time() <= blob.start_time());
        self.numeric.insert(pos, blob);
        Ok(())
    }

    /// Decodes and inserts a text blob, keeping `text` sorted by `start_time`.
    pub fn add_text_blob(&mut self, bytes: &[u8]) -> MeboResult<()> {
        let blob = text::decode(bytes)?;
        let pos = self.text.partition_point(|b| b.start_time() <= blob.start_time());
        self.text.insert(pos, blob);
        Ok(())
    }

    pub fn numeric_blob_count(&self) -> usize {
        self.numeric.len()
    }

    pub fn text_blob_count(&self) -> usize {
        self.text.len()
    }

    /// Which kind a metric is, or `None` if it appears in no blob in this set.
    pub fn metric_kind<'a>(&self, metric: impl Into<MetricRef<'a>>) -> Option<MetricKind> {
        let (id, _) = metric.into().resolve();
        if self.numeric.iter().any(|b| b.has_metric_id(id)) {
            Some(MetricKind::Numeric)
        } else if self.text.iter().any(|b| b.has_metric_id(id)) {
            Some(MetricKind::Text)
        } else {
            None
        }
    }

    /// Total point count for a metric across every numeric blob that
    /// contains it, in `start_time` order.
    pub fn len_numeric<'a>(&self, metric: impl Into<MetricRef<'a>>) -> (u64, bool) {
        let (id, _) = metric.into().resolve();
        let mut total = 0u64;
        let mut found = false;
        for blob in &self.numeric {
            let (count, hit) = blob.len(id);
            if hit {
                found = true;
                total += count as u64;
            }
        }
        (total, found)
    }

    pub fn len_text<'a>(&self, metric: impl Into<MetricRef<'a>>) -> (u64, bool) {
        let (id, _) = metric.into().resolve();
        let mut total = 0u64;
        let mut found = false;
        for blob in &self.text {
            let (count, hit) = blob.len(id);
            if hit {
                found = true;
                total += count as u64;
            }
        }
        (total, found)
    }

    /// Yields `(global_index, (timestamp, value, tag))` across every numeric
    /// blob containing `metric`, in `start_time` order.
    pub fn all_numeric<'a>(&self, metric: impl Into<MetricRef<'a>>) -> (Vec<(u64, (i64, f64, String))>, bool) {
        let (id, _) = metric.into().resolve();
        let mut out = Vec::new();
        let mut found = false;
        let mut global_index = 0u64;
        for blob in &self.numeric {
            let (points, hit) = blob.all(id);
            if hit {
                found = true;
                for point in points {
                    out.push((global_index, point));
                    global_index += 1;
                }
            }
        }
        (out, found)
    }

    pub fn all_text<'a>(&self, metric: impl Into<MetricRef<'a>>) -> (Vec<(u64, (i64, String, String))>, bool) {
        let (id, _) = metric.into().resolve();
        let mut out = Vec::new();
        let mut found = false;
        let mut global_index = 0u64;
        for blob in &self.text {
            let (points, hit) = blob.all(id);
            if hit {
                found = true;
                for point in points {
                    out.push((global_index, point));
                    global_index += 1;
                }
            }
        }
        (out, found)
    }

    /// Locates `global_index` by walking the (typically small) list of
    /// blobs containing `metric`, then delegates to that blob's own index.
    pub fn value_at_numeric<'a>(&self, metric: impl Into<MetricRef<'a>>, global_index: u64) -> ((i64, f64, String), bool) {
        let (id, _) = metric.into().resolve();
        let mut remaining = global_index;
        for blob in &self.numeric {
            let (count, hit) = blob.len(id);
            if !hit {
                continue;
            }
            if remaining < count as u64 {
                let local = remaining as usize;
                let (ts, ts_found) = blob.timestamp_at(id, local);
                let (val, _) = blob.value_at(id, local);
                let (tag, _) = blob.tag_at(id, local);
                return ((ts, val, tag), ts_found);
            }
            remaining -= count as u64;
        }
        ((0, 0.0, String::new()), false)
    }

    pub fn value_at_text<'a>(&self, metric: impl Into<MetricRef<'a>>, global_index: u64) -> ((i64, String, String), bool) {
        let (id, _) = metric.into().resolve();
        let mut remaining = global_index;
        for blob in &self.text {
            let (count, hit) = blob.len(id);
            if !hit {
                continue;
            }
            if remaining < count as u64 {
                let local = remaining as usize;
                let (ts, ts_found) = blob.timestamp_at(id, local);
                let (val, _) = blob.value_at(id, local);
                let (tag, _) = blob.tag_at(id, local);
                return ((ts, val, tag), ts_found);
            }
            remaining -= count as u64;
        }
        ((0, String::new(), String::new()), false)
    }

    /// Flattens one numeric metric's points across every containing blob
    /// into parallel arrays, without touching any other metric.
    pub fn materialize_numeric_metric<'a>(&self, metric: impl Into<MetricRef<'a>>) -> Option<MaterializedNumericMetric> {
        let (id, _) = metric.into().resolve();
        materialize::materialize_numeric_metric(&self.numeric, id)
    }

    pub fn materialize_text_metric<'a>(&self, metric: impl Into<MetricRef<'a>>) -> Option<MaterializedTextMetric> {
        let (id, _) = metric.into().resolve();
        materialize::materialize_text_metric(&self.text, id)
    }

    /// Flattens every metric in the set into a [`MaterializedBlobSet`].
    pub fn materialize(&self) -> MaterializedBlobSet {
        materialize::materialize_all(&self.numeric, &self.text)
    }
}

impl Default for BlobSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::{EncoderOptions, NumericEncoder};

    fn make_numeric_blob(start: i64, name: &str, points: &[(i64, f64)]) -> Vec<u8> {
        let mut enc = NumericEncoder::new(start, EncoderOptions::default());
        enc.start_metric(name, points.len() as u32).unwrap();
        for &(ts, val) in points {
            enc.add_data_point(ts, val, "").unwrap();
        }
        enc.end_metric().unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn s5_materialization_across_three_blobs() {
        let mut set = BlobSet::new();
        set.add_numeric_blob(&make_numeric_blob(0, "cpu", &[(1, 1.0), (2, 2.0)])).unwrap();
        set.add_numeric_blob(&make_numeric_blob(100, "cpu", &[(101, 3.0)])).unwrap();
        set.add_numeric_blob(&make_numeric_blob(200, "cpu", &[(201, 4.0), (202, 5.0)])).unwrap();

        assert_eq!(set.numeric_blob_count(), 3);
        let (total, found) = set.len_numeric("cpu");
        assert!(found);
        assert_eq!(total, 5);

        let (points, found) = set.all_numeric("cpu");
        assert!(found);
        let values: Vec<f64> = points.iter().map(|(_, (_, v, _))| *v).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let indices: Vec<u64> = points.iter().map(|(gi, _)| *gi).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);

        let (point, found) = set.value_at_numeric("cpu", 3);
        assert!(found);
        assert_eq!(point, (201, 4.0, String::new()));

        let (_, found) = set.value_at_numeric("cpu", 5);
        assert!(!found);

        let m = set.materialize_numeric_metric("cpu").unwrap();
        assert_eq!(m.timestamps, vec![1, 2, 101, 201, 202]);
        assert_eq!(m.values, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn blobs_inserted_out_of_order_are_kept_sorted_by_start_time() {
        let mut set = BlobSet::new();
        set.add_numeric_blob(&make_numeric_blob(200, "cpu", &[(201, 3.0)])).unwrap();
        set.add_numeric_blob(&make_numeric_blob(0, "cpu", &[(1, 1.0)])).unwrap();
        set.add_numeric_blob(&make_numeric_blob(100, "cpu", &[(101, 2.0)])).unwrap();

        let (points, _) = set.all_numeric("cpu");
        let values: Vec<f64> = points.iter().map(|(_, (_, v, _))| *v).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn unknown_metric_is_not_found_everywhere() {
        let mut set = BlobSet::new();
        set.add_numeric_blob(&make_numeric_blob(0, "cpu", &[(1, 1.0)])).unwrap();
        assert_eq!(set.metric_kind("nope"), None);
        assert_eq!(set.len_numeric("nope"), (0, false));
        assert!(set.materialize_numeric_metric("nope").is_none());
    }

    #[test]
    fn numeric_and_text_metrics_coexist_without_mixing() {
        let mut set = BlobSet::new();
        set.add_numeric_blob(&make_numeric_blob(0, "cpu", &[(1, 1.0)])).unwrap();
        let mut text_enc = crate::text::TextEncoder::new(0, crate::text::TextEncoderOptions::default());
        text_enc.start_metric("log", 1).unwrap();
        text_enc.add_data_point(1, "hello", "").unwrap();
        text_enc.end_metric().unwrap();
        set.add_text_blob(&text_enc.finish().unwrap()).unwrap();

        assert_eq!(set.metric_kind("cpu"), Some(MetricKind::Numeric));
        assert_eq!(set.metric_kind("log"), Some(MetricKind::Text));
    }
}
