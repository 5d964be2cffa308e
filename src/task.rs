//! Per-element task wrapper.
//!
//! [`guard`] is the only place where a user transformation actually runs on an
//! element, whichever backend is executing it. It turns errors *and* panics into
//! an in-band [`Failure`] and logs one warning per failed element.

use crate::outcome::{Failure, Outcome};
use anyhow::anyhow;
use std::any::Any;
use std::fmt::Debug;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Wrap a plain value as a successful outcome.
pub fn lift<T>(value: T) -> Outcome<T> {
    Outcome::Success(value)
}

/// Apply `f` to the value inside `input`.
///
/// A `Failure` is forwarded as is. For a `Success(x)`, `f(&x)` is evaluated;
/// an `Err` or a panic becomes `Failure(x, cause)`.
pub fn guard<I, O, F>(op: &str, f: F, input: Outcome<I>) -> Outcome<O>
where
    I: Debug + Send + Sync + 'static,
    F: FnOnce(&I) -> anyhow::Result<O>,
{
    let value = match input {
        Outcome::Success(v) => v,
        Outcome::Failure(e) => return Outcome::Failure(e),
    };
    let result = match catch_unwind(AssertUnwindSafe(|| f(&value))) {
        Ok(r) => r,
        Err(payload) => Err(anyhow!("panicked: {}", panic_message(payload.as_ref()))),
    };
    match result {
        Ok(out) => Outcome::Success(out),
        Err(cause) => fail(op, value, cause),
    }
}

/// Tag `value` as failed in `op` and emit the per-element warning.
pub(crate) fn fail<I, O>(op: &str, value: I, cause: anyhow::Error) -> Outcome<O>
where
    I: Debug + Send + Sync + 'static,
{
    log::warn!("{cause}, please check {value:?} with op {op}. Continue...");
    Outcome::Failure(Failure::new(value, op, cause))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
