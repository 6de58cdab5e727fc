//! In-memory lock-and-allocation service for a distributed batch-indexing
//! system: time-bounded, priority-ordered leases over intervals of a data
//! source's timeline, version minting, and partition routing.
//!
//! The workspace is split by concern:
//!
//! - [`lockbox_types`] — the pure data model (intervals, leases, shard
//!   specs, partition boundaries) with no behavior beyond what a value type
//!   can do on its own.
//! - [`lockbox_journal`] — the external-collaborator traits (lock journal,
//!   task catalog, historical segment index) plus in-memory reference
//!   implementations for testing.
//! - [`lockbox_core`] — the Lockbox giant-lock coordinator, the clock, and
//!   the per-row and bulk allocators built on top of it.
//! - [`lockbox_sampler`] — the bounded row-preview pipeline.
//!
//! This crate re-exports the pieces most callers need to wire up a
//! coordinator end to end.

pub use lockbox_core::{
    AllocateRequest, BulkAllocationRequest, BulkAllocator, LockAttempt, Lockbox, SegmentAllocator,
    SupervisedAllocator, Versioner,
};
pub use lockbox_journal::memory::{InMemoryHistoricalIndex, InMemoryLockJournal, InMemoryTaskCatalog};
pub use lockbox_journal::{DataSegment, HistoricalSegmentIndex, LockJournal, TaskCatalog, TaskDescriptor};
pub use lockbox_sampler::{
    DataSchema, InputSource, ParsedRow, RowFilter, RowTransform, SampledRow, Sampler,
    SamplerConfig, SamplerResponse, TimestampFormat, TimestampSpec, VecInputSource,
};
pub use lockbox_types::{
    Interval, JournaledLease, LockGranularity, LockKind, LockPosse, LockboxConfig, LockboxError,
    LockboxResult, PartialShardSpec, PartitionAnalysis, PartitionBoundaries, RowLike,
    SegmentIdWithShardSpec, ShardSpec, TaskLock, TimeGranularity, hash_dims,
};
