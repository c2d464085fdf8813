//! Metric-name hashing (C1).
//!
//! Thin wrapper around `xxhash-rust`, in the same style as the teacher's
//! `xxhash.rs` wrapper around `xxhash_rust::xxh32` — except this crate only
//! ever needs XXH64, used as the metric identity function.

/// Fixed seed used for every metric-name hash in this crate. Frozen: changing
/// it would change every existing blob's metric IDs.
pub const METRIC_ID_SEED: u64 = 0;

/// Hashes a metric name into its 64-bit identity.
///
/// Equivalent to `xxHash64(name, seed = 0)`. Two distinct names that hash to
/// the same ID within one blob trigger the collision-fallback name table
/// (see [`crate::numeric::encoder`] / [`crate::text::encoder`]).
#[inline]
pub fn metric_id(name: &str) -> u64 {
    xxhash_rust::xxh64::xxh64(name.as_bytes(), METRIC_ID_SEED)
}

/// A metric reference accepted by the encoder: either a raw ID the caller
/// has already hashed, or a name to hash at ingest.
#[derive(Debug, Clone, Copy)]
pub enum MetricRef<'a> {
    Id(u64),
    Name(&'a str),
}

impl<'a> MetricRef<'a> {
    /// Resolves to `(id, Some(name))` for a name reference, `(id, None)` for
    /// a raw ID (there is no name to remember for the collision table).
    pub(crate) fn resolve(&self) -> (u64, Option<&'a str>) {
        match self {
            MetricRef::Id(id) => (*id, None),
            MetricRef::Name(name) => (metric_id(name), Some(*name)),
        }
    }
}

impl<'a> From<&'a str> for MetricRef<'a> {
    fn from(name: &'a str) -> Self {
        MetricRef::Name(name)
    }
}

impl From<u64> for MetricRef<'static> {
    fn from(id: u64) -> Self {
        MetricRef::Id(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(metric_id("cpu.load"), metric_id("cpu.load"));
    }

    #[test]
    fn distinct_names_usually_differ() {
        assert_ne!(metric_id("cpu.load"), metric_id("mem.used"));
    }

    #[test]
    fn matches_reference_seed_zero_vector() {
        // XXH64("", seed=0) is a well-known test vector.
        assert_eq!(xxhash_rust::xxh64::xxh64(b"", 0), 0xEF46_DB37_51D8_E999);
        assert_eq!(metric_id(""), 0xEF46_DB37_51D8_E999);
    }

    #[test]
    fn metric_ref_from_name_resolves_hash_and_name() {
        let r: MetricRef = "a".into();
        let (id, name) = r.resolve();
        assert_eq!(id, metric_id("a"));
        assert_eq!(name, Some("a"));
    }

    #[test]
    fn metric_ref_from_id_resolves_without_name() {
        let r: MetricRef = 42u64.into();
        let (id, name) = r.resolve();
        assert_eq!(id, 42);
        assert_eq!(name, None);
    }
}
