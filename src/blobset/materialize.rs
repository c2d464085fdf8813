//! Eager flattening of a [`super::BlobSet`] into per-metric parallel arrays
//! with O(1) `value_at`. Grounded on the same whole-section materialization
//! idea as the lazy `OnceLock` caches in `numeric::blob`/`text::blob`, just
//! applied across the whole set instead of inside one blob.

use std::collections::HashMap;

use crate::numeric::NumericBlob;
use crate::text::TextBlob;

/// One numeric metric's points flattened across every blob that contains it.
#[derive(Debug, Clone, Default)]
pub struct MaterializedNumericMetric {
    pub timestamps: Vec<i64>,
    pub values: Vec<f64>,
    pub tags: Vec<String>,
}

impl MaterializedNumericMetric {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// O(1): every point already lives at its global index.
    pub fn value_at(&self, global_index: u64) -> (f64, bool) {
        match self.values.get(global_index as usize) {
            Some(v) => (*v, true),
            None => (0.0, false),
        }
    }
}

/// One text metric's points flattened across every blob that contains it.
#[derive(Debug, Clone, Default)]
pub struct MaterializedTextMetric {
    pub timestamps: Vec<i64>,
    pub values: Vec<String>,
    pub tags: Vec<String>,
}

impl MaterializedTextMetric {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn value_at(&self, global_index: u64) -> (String, bool) {
        match self.values.get(global_index as usize) {
            Some(v) => (v.clone(), true),
            None => (String::new(), false),
        }
    }
}

/// The whole-set materialization: every numeric and text metric, keyed by
/// metric ID, flattened into its own parallel arrays.
pub struct MaterializedBlobSet {
    numeric: HashMap<u64, MaterializedNumericMetric>,
    text: HashMap<u64, MaterializedTextMetric>,
}

impl MaterializedBlobSet {
    pub fn numeric_metric(&self, id: u64) -> Option<&MaterializedNumericMetric> {
        self.numeric.get(&id)
    }

    pub fn text_metric(&self, id: u64) -> Option<&MaterializedTextMetric> {
        self.text.get(&id)
    }

    pub fn value_at_numeric(&self, id: u64, global_index: u64) -> (f64, bool) {
        match self.numeric.get(&id) {
            Some(m) => m.value_at(global_index),
            None => (0.0, false),
        }
    }

    pub fn value_at_text(&self, id: u64, global_index: u64) -> (String, bool) {
        match self.text.get(&id) {
            Some(m) => m.value_at(global_index),
            None => (String::new(), false),
        }
    }
}

pub(super) fn materialize_numeric_metric(blobs: &[NumericBlob], id: u64) -> Option<MaterializedNumericMetric> {
    let mut out = MaterializedNumericMetric::default();
    let mut found = false;
    for blob in blobs {
        let (points, hit) = blob.all(id);
        if !hit {
            continue;
        }
        found = true;
        for (ts, val, tag) in points {
            out.timestamps.push(ts);
            out.values.push(val);
            out.tags.push(tag);
        }
    }
    found.then_some(out)
}

pub(super) fn materialize_text_metric(blobs: &[TextBlob], id: u64) -> Option<MaterializedTextMetric> {
    let mut out = MaterializedTextMetric::default();
    let mut found = false;
    for blob in blobs {
        let (points, hit) = blob.all(id);
        if !hit {
            continue;
        }
        found = true;
        for (ts, val, tag) in points {
            out.timestamps.push(ts);
            out.values.push(val);
            out.tags.push(tag);
        }
    }
    found.then_some(out)
}

/// Flattens every metric referenced by any blob in `numeric`/`text` into a
/// [`MaterializedBlobSet`]. A metric is numeric xor text by construction, so
/// each metric ID lands in exactly one of the two maps.
pub(super) fn materialize_all(numeric: &[NumericBlob], text: &[TextBlob]) -> MaterializedBlobSet {
    let mut numeric_ids: Vec<u64> = Vec::new();
    for blob in numeric {
        for id in blob.metric_ids() {
            if !numeric_ids.contains(&id) {
                numeric_ids.push(id);
            }
        }
    }
    let mut text_ids: Vec<u64> = Vec::new();
    for blob in text {
        for id in blob.metric_ids() {
            if !text_ids.contains(&id) {
                text_ids.push(id);
            }
        }
    }

    let mut numeric_map = HashMap::with_capacity(numeric_ids.len());
    for id in numeric_ids {
        if let Some(m) = materialize_numeric_metric(numeric, id) {
            numeric_map.insert(id, m);
        }
    }
    let mut text_map = HashMap::with_capacity(text_ids.len());
    for id in text_ids {
        if let Some(m) = materialize_text_metric(text, id) {
            text_map.insert(id, m);
        }
    }

    MaterializedBlobSet { numeric: numeric_map, text: text_map }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::{EncoderOptions, NumericEncoder};
    use crate::text::{TextEncoder, TextEncoderOptions};

    fn numeric_blob(start: i64, name: &str, points: &[(i64, f64)]) -> Vec<u8> {
        let mut enc = NumericEncoder::new(start, EncoderOptions::default());
        enc.start_metric(name, points.len() as u32).unwrap();
        for &(ts, val) in points {
            enc.add_data_point(ts, val, "").unwrap();
        }
        enc.end_metric().unwrap();
        enc.finish().unwrap()
    }

    fn text_blob(start: i64, name: &str, points: &[(i64, &str)]) -> Vec<u8> {
        let mut enc = TextEncoder::new(start, TextEncoderOptions::default());
        enc.start_metric(name, points.len() as u32).unwrap();
        for &(ts, val) in points {
            enc.add_data_point(ts, val, "").unwrap();
        }
        enc.end_metric().unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn whole_set_materialization_keeps_numeric_and_text_separate() {
        use crate::numeric::decode as decode_numeric;
        use crate::text::decode as decode_text;

        let numeric_blobs = vec![decode_numeric(&numeric_blob(0, "cpu", &[(1, 1.0), (2, 2.0)])).unwrap()];
        let text_blobs = vec![decode_text(&text_blob(0, "log", &[(1, "a")])).unwrap()];

        let materialized = materialize_all(&numeric_blobs, &text_blobs);

        let cpu_id = crate::hash::metric_id("cpu");
        let log_id = crate::hash::metric_id("log");

        let cpu = materialized.numeric_metric(cpu_id).unwrap();
        assert_eq!(cpu.values, vec![1.0, 2.0]);
        assert!(materialized.text_metric(cpu_id).is_none());

        let log = materialized.text_metric(log_id).unwrap();
        assert_eq!(log.values, vec!["a".to_string()]);
        assert!(materialized.numeric_metric(log_id).is_none());

        let (v, found) = materialized.value_at_numeric(cpu_id, 1);
        assert!(found);
        assert_eq!(v, 2.0);

        let (_, found) = materialized.value_at_numeric(cpu_id, 2);
        assert!(!found);
    }
}
