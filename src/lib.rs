//! # datacollection
//!
//! Lazy, chainable data collections with pluggable execution.
//!
//! A [`DataCollection<T>`] wraps either a list or a lazy stream and exposes a
//! fluent transformation API. Plain transformations (`map`, `filter`, `batch`,
//! ...) always run in place. Fault-isolated ones (`try_map`, `resolve`,
//! `dispatch`) run on the configured [`Backend`]:
//!
//! - **Local**: on the consuming thread, lazily
//! - **Threaded**: on a thread pool, at most `num_worker` calls in flight, input order kept
//! - **Pool**: on dedicated workers that set up their operator once and tear it
//!   down at the end; results arrive in completion order
//!
//! ## Quick start
//!
//! ```
//! use datacollection::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let out = DataCollection::of(vec![1, 2, 0, 3])
//!     .set_parallel(2)
//!     .try_map("ten_over", |x: &i32| {
//!         anyhow::ensure!(*x != 0, "division by zero");
//!         Ok(10 / x)
//!     })?
//!     .successes()
//!     .to_vec();
//! assert_eq!(out, vec![10, 5, 3]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Execution core
//!
//! A parallel map is a small pipeline of its own:
//!
//! ```text
//! source ──► submission loop ──► worker pool ──► relay queue ──► output sequence
//!            (admission control)                (bounded, one
//!                                                end-of-stream)
//! ```
//!
//! - [`submit`]: the loops that feed workers without exceeding their capacity
//! - [`pool`]: the [`WorkerPool`] interface and [`ThreadWorkerPool`]
//! - [`relay`] / [`output`]: the bounded hand-off and its lazy consumer
//! - [`task`]: the per-element wrapper turning errors and panics into [`Failure`]s
//!
//! ## Failures
//!
//! A broken element never stops a pipeline. It becomes an [`Outcome::Failure`]
//! carrying the input, the operation name and the cause, and a warning is
//! logged through the [`log`] facade. No logger is installed by this crate.

pub mod collection;
pub mod config;
pub mod error;
pub mod io;
pub mod ops;
pub mod outcome;
pub mod output;
pub mod pool;
pub mod relay;
pub mod submit;
pub mod task;
pub mod testing;
pub mod window;

pub use collection::{DataCollection, Element};
pub use config::{Backend, DcConfig, RuntimeEnv};
pub use error::DcError;
pub use io::{expand_glob, read_jsonl, write_jsonl};
pub use ops::{OpSpec, Operator, OperatorRegistry};
pub use outcome::{Failure, Outcome};
pub use output::OutputSequence;
pub use pool::{ThreadWorkerPool, WorkerPool, cleanup_cache};
pub use task::{guard, lift};
