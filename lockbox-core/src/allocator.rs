use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lockbox_journal::HistoricalSegmentIndex;
use lockbox_types::{
    Interval, LockGranularity, LockKind, LockboxError, LockboxResult, PartialShardSpec,
    PartitionAnalysis, RowLike, SegmentIdWithShardSpec, TimeGranularity, hash_dims,
};

use crate::lockbox::Lockbox;

/// One row's allocation request (§4.3 "Segment Allocator (per-row)").
pub struct AllocateRequest<'a> {
    pub task_id: &'a str,
    pub row: &'a dyn RowLike,
    pub sequence_name: &'a str,
    pub previous_segment_id: Option<String>,
    pub skip_lineage_check: bool,
    /// `None` means unrestricted (the finest possible granularity).
    pub query_granularity: Option<TimeGranularity>,
}

/// Per-row entry point minting [`SegmentIdWithShardSpec`] identities under a
/// Lockbox-held lease (§4.3).
pub struct SegmentAllocator {
    lockbox: Arc<Lockbox>,
    historical: Arc<dyn HistoricalSegmentIndex>,
    analysis: PartitionAnalysis,
    data_source: String,
    lock_kind: LockKind,
    lock_granularity: LockGranularity,
    preferred_segment_granularity: TimeGranularity,
    hashed_dims: Vec<String>,
    range_dimension: Option<String>,
    sequences: Mutex<HashMap<String, String>>,
}

impl SegmentAllocator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lockbox: Arc<Lockbox>,
        historical: Arc<dyn HistoricalSegmentIndex>,
        analysis: PartitionAnalysis,
        data_source: String,
        lock_kind: LockKind,
        lock_granularity: LockGranularity,
        preferred_segment_granularity: TimeGranularity,
        hashed_dims: Vec<String>,
        range_dimension: Option<String>,
    ) -> Self {
        Self {
            lockbox,
            historical,
            analysis,
            data_source,
            lock_kind,
            lock_granularity,
            preferred_segment_granularity,
            hashed_dims,
            range_dimension,
            sequences: Mutex::new(HashMap::new()),
        }
    }

    /// Mints an identity for `request.row`, or returns `None` if the row
    /// cannot be allocated under the current lease shape (forked sequence,
    /// forbidden coarser query granularity).
    pub fn allocate(
        &self,
        request: AllocateRequest<'_>,
    ) -> LockboxResult<Option<SegmentIdWithShardSpec>> {
        let timestamp = request
            .row
            .timestamp_millis()
            .ok_or_else(|| LockboxError::UnparseableRow("row has no timestamp".into()))?;

        let (effective_interval, effective_granularity) = self.effective_bucket(timestamp);

        if let Some(query_granularity) = request.query_granularity {
            if query_granularity.coarser_than(effective_granularity) {
                log::debug!(
                    "allocation refused: query granularity {query_granularity:?} is coarser than \
                     effective segment granularity {effective_granularity:?}"
                );
                return Ok(None);
            }
        }

        let lease = self.lockbox.lock(
            request.task_id,
            effective_interval,
            self.lock_kind,
            self.lock_granularity,
        )?;

        let partial = self.partial_shard_spec(&request, &effective_interval)?;
        let shard_spec = self
            .lockbox
            .complete_partition(&self.data_source, effective_interval, &partial);

        let segment_id = SegmentIdWithShardSpec {
            data_source: self.data_source.clone(),
            interval: effective_interval,
            version: lease.version,
            shard_spec,
        };

        if !self.check_and_advance_sequence(
            request.sequence_name,
            request.previous_segment_id.as_deref(),
            request.skip_lineage_check,
            &segment_id,
        ) {
            return Ok(None);
        }

        Ok(Some(segment_id))
    }

    fn effective_bucket(&self, timestamp: i64) -> (Interval, TimeGranularity) {
        let preferred = self.preferred_segment_granularity.bucket(timestamp);
        let overlapping = self
            .historical
            .segments_overlapping(&self.data_source, &preferred);
        let inferred = overlapping
            .first()
            .and_then(|seg| TimeGranularity::from_duration_millis(seg.interval.duration_millis()));
        match inferred {
            Some(granularity) if granularity != self.preferred_segment_granularity => {
                (granularity.bucket(timestamp), granularity)
            }
            _ => (preferred, self.preferred_segment_granularity),
        }
    }

    fn partial_shard_spec(
        &self,
        request: &AllocateRequest<'_>,
        interval: &Interval,
    ) -> LockboxResult<PartialShardSpec> {
        match &self.analysis {
            PartitionAnalysis::Dynamic(_) => Ok(PartialShardSpec::Numbered),
            PartitionAnalysis::Hashed(_) => {
                if self.lock_granularity == LockGranularity::Segment {
                    return Err(LockboxError::UnsupportedCombination(
                        "hashed partitioning cannot be combined with segment-level locking".into(),
                    ));
                }
                let num_buckets = self
                    .analysis
                    .num_buckets(interval)
                    .ok_or_else(|| LockboxError::UnsupportedCombination(
                        "no hashed partition analysis for this interval".into(),
                    ))?;
                if num_buckets == 0 {
                    return Err(LockboxError::UnsupportedCombination(
                        "numBuckets = 0 is ill-formed".into(),
                    ));
                }
                let bucket_id = hash_dims(&self.hashed_dims, request.row).rem_euclid(num_buckets);
                Ok(PartialShardSpec::Hashed {
                    dims: self.hashed_dims.clone(),
                    bucket_id,
                    num_buckets,
                })
            }
            PartitionAnalysis::SingleDimensionRange(_) => {
                if self.lock_granularity == LockGranularity::Segment {
                    return Err(LockboxError::UnsupportedCombination(
                        "range partitioning cannot be combined with segment-level locking".into(),
                    ));
                }
                let dim = self.range_dimension.clone().ok_or_else(|| {
                    LockboxError::UnsupportedCombination(
                        "range partitioning requires a partition dimension".into(),
                    )
                })?;
                let boundaries = self.analysis.boundaries(interval).ok_or_else(|| {
                    LockboxError::UnsupportedCombination(
                        "no range partition analysis for this interval".into(),
                    )
                })?;
                let key = request.row.dimension(&dim);
                let bucket = boundaries.bucket_for(key);
                let (start, end) = boundaries.range_for(bucket);
                Ok(PartialShardSpec::SingleDim {
                    dim,
                    start: start.map(str::to_string),
                    end: end.map(str::to_string),
                })
            }
        }
    }

    fn check_and_advance_sequence(
        &self,
        sequence_name: &str,
        previous_segment_id: Option<&str>,
        skip_lineage_check: bool,
        segment_id: &SegmentIdWithShardSpec,
    ) -> bool {
        let key = segment_key(segment_id);
        let mut sequences = self.sequences.lock().unwrap();
        if skip_lineage_check {
            sequences.insert(sequence_name.to_string(), key);
            return true;
        }
        let tail = sequences.get(sequence_name).map(String::as_str);
        if previous_segment_id != tail {
            log::debug!(
                "sequence {sequence_name:?} forked: expected tail {tail:?}, caller supplied {previous_segment_id:?}"
            );
            return false;
        }
        sequences.insert(sequence_name.to_string(), key);
        true
    }
}

fn segment_key(segment_id: &SegmentIdWithShardSpec) -> String {
    format!(
        "{}|{}|{}|{}",
        segment_id.data_source,
        segment_id.interval,
        segment_id.version,
        segment_id.partition_num()
    )
}
