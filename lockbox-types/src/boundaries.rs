use serde::{Deserialize, Serialize};

/// A sorted, sentinel-bounded array of range-partition cut points.
///
/// Positions `0` and `len - 1` are structurally the `-inf`/`+inf` sentinels
/// (stored as `None`); everything in between is a distinct, strictly
/// increasing `Some(value)`. `num_buckets() == len() - 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionBoundaries {
    boundaries: Vec<Option<String>>,
}

impl PartitionBoundaries {
    /// Builds a boundary table from raw cut-point candidates.
    ///
    /// The caller's first and last entries are conventionally placeholders
    /// (their values do not matter): construction distinct-sorts the whole
    /// input, then unconditionally overwrites index `0` and the last index
    /// with the sentinel, per §4.5.
    pub fn new(mut values: Vec<String>) -> Self {
        values.sort();
        values.dedup();

        if values.len() == 1 {
            values.push(values[0].clone());
        }

        let last = values.len() - 1;
        let mut boundaries: Vec<Option<String>> = values.into_iter().map(Some).collect();
        boundaries[0] = None;
        boundaries[last] = None;

        debug_assert!(boundaries.len() >= 2);
        Self { boundaries }
    }

    pub fn num_buckets(&self) -> usize {
        self.boundaries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// The bucket that `key` falls into, or bucket `0` if `key` is absent.
    ///
    /// Binary search over the inner (non-sentinel) boundaries: the result is
    /// the count of inner boundaries `<= key`, which is exactly the bucket
    /// index `b` such that `boundaries[b] <= key < boundaries[b+1]`.
    pub fn bucket_for(&self, key: Option<&str>) -> usize {
        let key = match key {
            None => return 0,
            Some(key) => key,
        };

        let inner = &self.boundaries[1..self.boundaries.len() - 1];
        inner.partition_point(|b| b.as_deref().unwrap() <= key)
    }

    /// The `[start, end)` dimension range for `bucket`, as `None` sentinels
    /// on either side where the bucket borders `-inf`/`+inf`.
    pub fn range_for(&self, bucket: usize) -> (Option<&str>, Option<&str>) {
        let start = self.boundaries[bucket].as_deref();
        let end = self.boundaries[bucket + 1].as_deref();
        (start, end)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn construction_overwrites_end_sentinels() {
        // The example from §8 scenario S5: `[a, c, f, <placeholder>]`.
        let b = PartitionBoundaries::new(vec![
            "a".into(),
            "c".into(),
            "f".into(),
            "z-placeholder".into(),
        ]);
        assert_eq!(b.num_buckets(), 3);
        assert_eq!(b.range_for(0), (None, Some("c")));
        assert_eq!(b.range_for(1), (Some("c"), Some("f")));
        assert_eq!(b.range_for(2), (Some("f"), None));
    }

    #[test]
    fn single_unique_value_still_yields_one_bucket() {
        let b = PartitionBoundaries::new(vec!["only".into(), "only".into()]);
        assert_eq!(b.num_buckets(), 1);
        assert_eq!(b.range_for(0), (None, None));
    }

    #[test]
    fn bucket_for_respects_half_open_ranges() {
        let b = PartitionBoundaries::new(vec![
            "a".into(),
            "c".into(),
            "f".into(),
            "placeholder".into(),
        ]);
        assert_eq!(b.bucket_for(Some("b")), 0);
        assert_eq!(b.bucket_for(Some("d")), 1);
        assert_eq!(b.bucket_for(Some("g")), 2);
        assert_eq!(b.bucket_for(Some("c")), 1, "lower bound of a bucket belongs to it");
        assert_eq!(b.bucket_for(None), 0);
    }
}
