use std::collections::{BTreeMap, BTreeSet};

use crate::boundaries::PartitionBoundaries;
use crate::interval::Interval;

/// The plan computed before allocation begins: how many partitions (if
/// known up front) each interval of a data source gets, per §3's three
/// partition-spec flavors.
#[derive(Debug, Clone)]
pub enum PartitionAnalysis {
    /// Partition count is unbounded and decided at allocation time; only
    /// the interval set itself is fixed in advance.
    Dynamic(BTreeSet<Interval>),

    /// A fixed bucket count per interval.
    Hashed(BTreeMap<Interval, i32>),

    /// A sorted cut-point table per interval.
    SingleDimensionRange(BTreeMap<Interval, PartitionBoundaries>),
}

impl PartitionAnalysis {
    pub fn intervals(&self) -> BTreeSet<Interval> {
        match self {
            PartitionAnalysis::Dynamic(set) => set.clone(),
            PartitionAnalysis::Hashed(map) => map.keys().copied().collect(),
            PartitionAnalysis::SingleDimensionRange(map) => map.keys().copied().collect(),
        }
    }

    pub fn num_buckets(&self, interval: &Interval) -> Option<i32> {
        match self {
            PartitionAnalysis::Dynamic(_) => None,
            PartitionAnalysis::Hashed(map) => map.get(interval).copied(),
            PartitionAnalysis::SingleDimensionRange(map) => {
                map.get(interval).map(|b| b.num_buckets() as i32)
            }
        }
    }

    pub fn boundaries(&self, interval: &Interval) -> Option<&PartitionBoundaries> {
        match self {
            PartitionAnalysis::SingleDimensionRange(map) => map.get(interval),
            _ => None,
        }
    }
}
