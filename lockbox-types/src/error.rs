/// Error kinds surfaced by the lock-and-allocation core.
///
/// These are tagged results, not a catch-all failure channel: callers are
/// expected to match on the variant and decide whether to retry, back off,
/// or give up, exactly as described for each Lockbox/allocator operation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LockboxError {
    /// `lock`/`try_lock` was invoked by a task the Lockbox has not seen via `add`.
    #[error("task {0:?} is not active")]
    InactiveTask(String),

    /// The requested interval has non-positive duration.
    #[error("interval has non-positive duration")]
    EmptyInterval,

    /// The lease the caller held, or asked about, has been preempted.
    #[error("lease for task {task:?} on the requested interval was revoked")]
    Revoked { task: String },

    /// The request cannot be granted right now but is not permanently refused.
    #[error("lock request for task {0:?} is contended")]
    Contention(String),

    /// The durable journal refused the write; the in-memory grant was rolled back.
    #[error("journal write failed: {0}")]
    JournalFailure(String),

    /// A bulk allocation minted a different number of identities than requested.
    #[error("bulk allocation produced {actual} identities, expected {expected}")]
    PartitionMismatch { expected: usize, actual: usize },

    /// Hash or range partitioning was requested together with segment-level locking.
    #[error("{0} partitioning cannot be combined with segment-level locking")]
    UnsupportedCombination(String),

    /// A row's timestamp or partition dimension could not be derived.
    #[error("unparseable row: {0}")]
    UnparseableRow(String),

    /// `lock()`'s wait budget expired before a lease became available.
    #[error("lock request for task {0:?} timed out")]
    Timeout(String),

    /// A `LockboxConfig` value failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Two or more posses were found in a state the grant algorithm never
    /// expects to construct (e.g. more than one SHARED posse matching a
    /// requester's group on the same interval).
    #[error("lockbox consistency fault: {0}")]
    ConsistencyFault(String),
}

pub type LockboxResult<T> = Result<T, LockboxError>;
