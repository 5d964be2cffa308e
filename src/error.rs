//! Typed errors raised by collections, pools and the submission loop.
//!
//! Public APIs return [`anyhow::Result`]; these variants are what ends up
//! inside, so callers can `downcast_ref::<DcError>()` when they need to react
//! to one case specifically. Per-element failures are *not* errors: they travel
//! in-band as [`Failure`](crate::Failure) values.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DcError {
    /// A list-only operation was called on a stream-backed collection.
    #[error("{op}() is only supported for data collection created from list")]
    NotAList { op: &'static str },

    /// `submit` was called on a pool with no idle worker.
    #[error("worker pool at capacity ({capacity} tasks in flight)")]
    CapacityExceeded { capacity: usize },

    /// Neither the local call mapping nor the hub knows this operator path.
    #[error("unknown operator: {path}")]
    UnknownOperator { path: String },

    /// One-time worker initialization failed.
    #[error("worker {worker} failed to initialize")]
    WorkerSetup {
        worker: usize,
        #[source]
        source: anyhow::Error,
    },

    /// The output sequence was dropped while the producer was still running.
    #[error("output sequence dropped before the end of stream")]
    ConsumerGone,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("there are no files matching {0}")]
    NoMatchingFiles(String),
}
