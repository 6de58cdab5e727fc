use serde::{Deserialize, Serialize};

use crate::row::RowLike;

/// The fully-resolved routing descriptor for one segment: a partition
/// number, optionally a bucket identity or dimension range, and an implicit
/// `accepts(row)` predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShardSpec {
    /// A single, non-partitioned shard. Not produced by completion; carried
    /// only for segments announced with a fixed identity ahead of time.
    Linear { #[serde(rename = "partitionNum")] partition_num: i32 },

    Numbered {
        #[serde(rename = "partitionNum")]
        partition_num: i32,
        #[serde(rename = "numCorePartitions")]
        num_core_partitions: i32,
    },

    Hashed {
        #[serde(rename = "partitionNum")]
        partition_num: i32,
        dims: Vec<String>,
        #[serde(rename = "bucketId")]
        bucket_id: i32,
        #[serde(rename = "numBuckets")]
        num_buckets: i32,
        #[serde(rename = "numCorePartitions")]
        num_core_partitions: i32,
    },

    #[serde(rename = "single_dim")]
    SingleDim {
        #[serde(rename = "partitionNum")]
        partition_num: i32,
        dim: String,
        start: Option<String>,
        end: Option<String>,
    },

    NumberedOverwrite {
        #[serde(rename = "partitionNum")]
        partition_num: i32,
        #[serde(rename = "startRootPartitionId")]
        start_root: i32,
        #[serde(rename = "endRootPartitionId")]
        end_root: i32,
        #[serde(rename = "minorVersion")]
        minor_version: i32,
    },
}

impl ShardSpec {
    pub fn partition_num(&self) -> i32 {
        match self {
            ShardSpec::Linear { partition_num }
            | ShardSpec::Numbered { partition_num, .. }
            | ShardSpec::Hashed { partition_num, .. }
            | ShardSpec::SingleDim { partition_num, .. }
            | ShardSpec::NumberedOverwrite { partition_num, .. } => *partition_num,
        }
    }

    /// Whether `row` belongs in this shard. Numbered/overwrite/linear shards
    /// accept every row in their interval; hashed and single-dim shards are
    /// content-addressed.
    pub fn accepts(&self, row: &dyn RowLike) -> bool {
        match self {
            ShardSpec::Linear { .. }
            | ShardSpec::Numbered { .. }
            | ShardSpec::NumberedOverwrite { .. } => true,
            ShardSpec::Hashed {
                dims,
                bucket_id,
                num_buckets,
                ..
            } => crate::hashing::hash_dims(dims, row).rem_euclid(*num_buckets) == *bucket_id,
            ShardSpec::SingleDim { dim, start, end, .. } => {
                let value = row.dimension(dim);
                let above_start = match (start, value) {
                    (None, _) => true,
                    (Some(_), None) => false,
                    (Some(s), Some(v)) => s.as_str() <= v,
                };
                let below_end = match (end, value) {
                    (None, _) => true,
                    (Some(_), None) => false,
                    (Some(e), Some(v)) => v < e.as_str(),
                };
                above_start && below_end
            }
        }
    }
}

/// An incomplete shard spec that needs the previous-maximum partition
/// identity in the interval to become final (§4.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartialShardSpec {
    Numbered,

    Hashed {
        dims: Vec<String>,
        #[serde(rename = "bucketId")]
        bucket_id: i32,
        #[serde(rename = "numBuckets")]
        num_buckets: i32,
    },

    #[serde(rename = "single_dim")]
    SingleDim {
        dim: String,
        start: Option<String>,
        end: Option<String>,
    },

    NumberedOverwrite {
        #[serde(rename = "startRootPartitionId")]
        start_root: i32,
        #[serde(rename = "endRootPartitionId")]
        end_root: i32,
        #[serde(rename = "minorVersion")]
        minor_version: i32,
    },
}

impl PartialShardSpec {
    /// Completes this partial spec into a full `ShardSpec`, given the
    /// previous-maximum shard spec in the interval (`None` if the interval
    /// is new to the historical index).
    ///
    /// Pure and deterministic: the same `(self, prev)` always yields the
    /// same identity (§4.2 "Bucket→partition-id derivation is pure").
    pub fn complete(&self, prev: Option<&ShardSpec>) -> ShardSpec {
        match self {
            PartialShardSpec::Numbered => {
                let partition_num = prev.map_or(0, |p| p.partition_num() + 1);
                let num_core_partitions = match prev {
                    Some(ShardSpec::Numbered {
                        num_core_partitions,
                        ..
                    }) => *num_core_partitions,
                    _ => 0,
                };
                ShardSpec::Numbered {
                    partition_num,
                    num_core_partitions,
                }
            }
            PartialShardSpec::Hashed {
                dims,
                bucket_id,
                num_buckets,
            } => {
                let floor = prev.map_or(0, |p| p.partition_num() + 1);
                let partition_num = next_congruent(floor, *bucket_id, *num_buckets);
                // Open question (§9): whether a segment-lock-driven first
                // allocation should know `num_buckets` in advance and set
                // `num_core_partitions` accordingly is left unresolved by
                // the grant algorithm; see DESIGN.md.
                ShardSpec::Hashed {
                    partition_num,
                    dims: dims.clone(),
                    bucket_id: *bucket_id,
                    num_buckets: *num_buckets,
                    num_core_partitions: 0,
                }
            }
            PartialShardSpec::SingleDim { dim, start, end } => {
                let partition_num = prev.map_or(0, |p| p.partition_num() + 1);
                ShardSpec::SingleDim {
                    partition_num,
                    dim: dim.clone(),
                    start: start.clone(),
                    end: end.clone(),
                }
            }
            PartialShardSpec::NumberedOverwrite {
                start_root,
                end_root,
                minor_version,
            } => {
                let partition_num = *start_root;
                ShardSpec::NumberedOverwrite {
                    partition_num,
                    start_root: *start_root,
                    end_root: *end_root,
                    minor_version: *minor_version,
                }
            }
        }
    }
}

/// Smallest integer `>= floor` that is congruent to `bucket_id (mod num_buckets)`.
fn next_congruent(floor: i32, bucket_id: i32, num_buckets: i32) -> i32 {
    debug_assert!(num_buckets > 0, "numBuckets = 0 must be rejected before completion");
    let remainder = (floor - bucket_id).rem_euclid(num_buckets);
    if remainder == 0 {
        floor
    } else {
        floor + (num_buckets - remainder)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::row::RowLike;

    struct TestRow {
        dims: std::collections::HashMap<String, String>,
    }
    impl RowLike for TestRow {
        fn timestamp_millis(&self) -> Option<i64> {
            None
        }
        fn dimension(&self, name: &str) -> Option<&str> {
            self.dims.get(name).map(|s| s.as_str())
        }
    }

    #[test]
    fn numbered_increments_from_previous() {
        let prev = ShardSpec::Numbered {
            partition_num: 2,
            num_core_partitions: 0,
        };
        let next = PartialShardSpec::Numbered.complete(Some(&prev));
        assert_eq!(next.partition_num(), 3);
    }

    #[test]
    fn numbered_starts_at_zero_when_no_history() {
        let next = PartialShardSpec::Numbered.complete(None);
        assert_eq!(next.partition_num(), 0);
    }

    #[test]
    fn hashed_next_congruent_partition_number() {
        let spec = PartialShardSpec::Hashed {
            dims: vec!["host".into()],
            bucket_id: 1,
            num_buckets: 3,
        };
        // No history: floor = 0, want smallest >=0 congruent to 1 mod 3 -> 1.
        assert_eq!(spec.complete(None).partition_num(), 1);

        let prev = ShardSpec::Hashed {
            partition_num: 1,
            dims: vec!["host".into()],
            bucket_id: 1,
            num_buckets: 3,
            num_core_partitions: 0,
        };
        // floor = 2, want smallest >=2 congruent to 1 mod 3 -> 4.
        assert_eq!(spec.complete(Some(&prev)).partition_num(), 4);
    }

    #[test]
    fn single_dim_accepts_within_range() {
        let spec = ShardSpec::SingleDim {
            partition_num: 0,
            dim: "host".into(),
            start: Some("c".into()),
            end: Some("f".into()),
        };
        let row_in = TestRow {
            dims: [("host".to_string(), "d".to_string())].into_iter().collect(),
        };
        let row_out = TestRow {
            dims: [("host".to_string(), "z".to_string())].into_iter().collect(),
        };
        assert!(spec.accepts(&row_in));
        assert!(!spec.accepts(&row_out));
    }
}
