//! Layered error types for the consensus kernel.
//!
//! `AppError` is the top-level error surfaced by the binary and the
//! orchestration layer; `StorageError` and `ConsensusError` are the
//! subsystem-specific errors it wraps. Orphaned blocks and refused
//! reorgs are not represented as errors at all — see `dag::InsertOutcome`
//! and `dag::ReorgPlan`, which model those as ordinary `Ok` values.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Storage initialization error: {0}")]
    StorageInit(String),

    #[error("Consensus error: {0}")]
    Consensus(#[from] ConsensusError),

    #[error("Time sync failed: system clock off by {offset_ms}ms (max: {max_offset_ms}ms)")]
    TimeSyncFailed { offset_ms: i64, max_offset_ms: i64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Initialization error: {0}")]
    Initialization(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to open {name} database: {source}")]
    DatabaseOpen {
        name: String,
        #[source]
        source: sled::Error,
    },

    #[error("Database operation failed: {0}")]
    DatabaseOp(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Consensus-kernel errors, per the error-kind taxonomy below.
///
/// - *Malformed*: fails deserialization, wrong magic, oversize field.
/// - *Structural*: header/body inconsistent (wrong root, too many parents).
/// - *Consensus-invalid*: bad signature, bad eligibility proof, bad VDF
///   chaining, timestamp out of skew.
/// - *Transient*: source timeout, insufficient quorum — retry by design.
///
/// Orphaned and finality-violation are deliberately absent here; they are
/// recoverable outcomes represented as plain `Ok` values by their callers.
#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("malformed data: {0}")]
    Malformed(String),

    #[error("structural violation: {0}")]
    Structural(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid eligibility proof")]
    InvalidEligibilityProof,

    #[error("invalid VDF proof: {0}")]
    InvalidVdfProof(String),

    #[error("VDF chaining broken: {0}")]
    VdfChainBroken(String),

    #[error("timestamp {timestamp_ms} out of allowed skew (now {now_ms}, max drift {max_drift_ms}ms)")]
    TimestampOutOfSkew {
        timestamp_ms: i64,
        now_ms: i64,
        max_drift_ms: i64,
    },

    #[error("transient failure: {0}")]
    Transient(String),
}
