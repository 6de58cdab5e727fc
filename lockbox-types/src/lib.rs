//! Core data model for the segment lock-and-allocation service.
//!
//! This crate carries no behavior beyond what a pure value type can do on
//! its own (`PartitionBoundaries::bucket_for`, `PartialShardSpec::complete`,
//! `ShardSpec::accepts`). The stateful coordinator — the Lockbox, the
//! allocators, the clock — lives in `lockbox-core`.
//!
//! # Data model
//!
//! - [`Interval`] is the half-open instant range everything else indexes by.
//! - [`TaskLock`] and [`LockPosse`] are the lease and its holder-task set.
//! - [`ShardSpec`] is a fully-resolved routing descriptor; [`PartialShardSpec`]
//!   is the pre-completion variant that still needs a previous-maximum
//!   identity to become one.
//! - [`PartitionBoundaries`] is the sentinel-bounded sorted cut-point table
//!   backing single-dimension-range partitioning.
//! - [`PartitionAnalysis`] is the pre-allocation plan tying an interval set
//!   to one of the three partitioning flavors.
//! - [`SegmentIdWithShardSpec`] is the fully-minted segment identity.

mod boundaries;
mod config;
mod error;
mod granularity;
mod hashing;
mod interval;
mod lease;
mod partition_analysis;
mod row;
mod segment;
mod shard_spec;

pub use boundaries::PartitionBoundaries;
pub use config::LockboxConfig;
pub use error::{LockboxError, LockboxResult};
pub use granularity::TimeGranularity;
pub use hashing::hash_dims;
pub use interval::Interval;
pub use lease::{JournaledLease, LockGranularity, LockKind, LockPosse, TaskLock};
pub use partition_analysis::PartitionAnalysis;
pub use row::RowLike;
pub use segment::SegmentIdWithShardSpec;
pub use shard_spec::{PartialShardSpec, ShardSpec};
