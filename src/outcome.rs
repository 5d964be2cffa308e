//! Per-element results.
//!
//! Every fault-isolated transformation produces an [`Outcome<T>`]: either the
//! transformed value or a [`Failure`] that remembers which input broke and why.
//! Failures are ordinary data. They flow through later stages untouched, so a
//! single bad element never stops a pipeline and the caller decides what to do
//! with it by pattern matching.
//!
//! ```
//! use datacollection::*;
//!
//! let out = DataCollection::of(vec![1, 2, 0, 4])
//!     .try_map("inverse", |x: &i32| {
//!         anyhow::ensure!(*x != 0, "division by zero");
//!         Ok(100 / x)
//!     })?
//!     .to_vec();
//!
//! assert_eq!(out.iter().filter(|o| o.is_failure()).count(), 1);
//! assert_eq!(out[2].failure().and_then(|f| f.input::<i32>()), Some(&0));
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A tagged per-element failure.
///
/// Holds the original input (type-erased, recoverable with [`Failure::input`]),
/// its `Debug` rendering, the operation name and the cause.
#[derive(Clone)]
pub struct Failure {
    input: Arc<dyn Any + Send + Sync>,
    input_repr: String,
    op: String,
    cause: Arc<anyhow::Error>,
}

impl Failure {
    pub fn new<I>(input: I, op: impl Into<String>, cause: anyhow::Error) -> Self
    where
        I: fmt::Debug + Send + Sync + 'static,
    {
        Self {
            input_repr: format!("{input:?}"),
            input: Arc::new(input),
            op: op.into(),
            cause: Arc::new(cause),
        }
    }

    /// The input that failed, if it was of type `I`.
    #[must_use]
    pub fn input<I: 'static>(&self) -> Option<&I> {
        self.input.downcast_ref::<I>()
    }

    /// `Debug` rendering of the input, available whatever its type.
    #[must_use]
    pub fn input_repr(&self) -> &str {
        &self.input_repr
    }

    #[must_use]
    pub fn op(&self) -> &str {
        &self.op
    }

    #[must_use]
    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("input", &self.input_repr)
            .field("op", &self.op)
            .field("cause", &format_args!("{}", self.cause))
            .finish()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, please check {} with op {}",
            self.cause, self.input_repr, self.op
        )
    }
}

impl std::error::Error for Failure {}

/// Either a successfully transformed value or a tagged failure.
#[derive(Clone, Debug)]
pub enum Outcome<T> {
    Success(T),
    Failure(Failure),
}

impl<T> Outcome<T> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    pub fn success(self) -> Option<T> {
        match self {
            Outcome::Success(v) => Some(v),
            Outcome::Failure(_) => None,
        }
    }

    #[must_use]
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(f) => Some(f),
        }
    }

    pub fn as_ref(&self) -> Outcome<&T> {
        match self {
            Outcome::Success(v) => Outcome::Success(v),
            Outcome::Failure(f) => Outcome::Failure(f.clone()),
        }
    }

    /// Apply `f` to a success; failures pass through unchanged.
    pub fn map<O, F: FnOnce(T) -> O>(self, f: F) -> Outcome<O> {
        match self {
            Outcome::Success(v) => Outcome::Success(f(v)),
            Outcome::Failure(e) => Outcome::Failure(e),
        }
    }

    pub fn and_then<O, F: FnOnce(T) -> Outcome<O>>(self, f: F) -> Outcome<O> {
        match self {
            Outcome::Success(v) => f(v),
            Outcome::Failure(e) => Outcome::Failure(e),
        }
    }

    /// # Errors
    /// Returns the carried [`Failure`] for a failed element.
    pub fn into_result(self) -> Result<T, Failure> {
        match self {
            Outcome::Success(v) => Ok(v),
            Outcome::Failure(e) => Err(e),
        }
    }

    pub fn unwrap_or(self, default: T) -> T {
        self.success().unwrap_or(default)
    }
}

impl<T> From<T> for Outcome<T> {
    fn from(value: T) -> Self {
        Outcome::Success(value)
    }
}
