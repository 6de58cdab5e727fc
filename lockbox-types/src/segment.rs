use serde::{Deserialize, Serialize};

use crate::interval::Interval;
use crate::shard_spec::ShardSpec;

/// A minted segment identity: the uniquely-naming tuple `(dataSource,
/// interval, version, shardSpec)` of one published segment.
///
/// Uniqueness key is `(dataSource, interval, version, partitionNum)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentIdWithShardSpec {
    #[serde(rename = "dataSource")]
    pub data_source: String,
    pub interval: Interval,
    pub version: String,
    #[serde(rename = "shardSpec")]
    pub shard_spec: ShardSpec,
}

impl SegmentIdWithShardSpec {
    pub fn partition_num(&self) -> i32 {
        self.shard_spec.partition_num()
    }
}
