//! Test doubles for operators and worker pools.

use crate::error::DcError;
use crate::ops::Operator;
use crate::outcome::Outcome;
use crate::pool::WorkerPool;
use crate::task::guard;
use anyhow::{Result, bail};
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Shared counters for operators built through [`OperatorProbe::operator`].
///
/// Clones share the same counters, so a probe can be moved into an operator
/// factory and still be read from the test afterwards.
#[derive(Clone, Debug, Default)]
pub struct OperatorProbe {
    setups: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
    teardowns: Arc<AtomicUsize>,
}

impl OperatorProbe {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an operator around `f`; counts as one setup.
    pub fn operator<I, O, F>(&self, f: F) -> ProbedOperator<F>
    where
        F: FnMut(&I) -> Result<O> + Send,
    {
        self.setups.fetch_add(1, Ordering::SeqCst);
        ProbedOperator {
            f,
            probe: self.clone(),
        }
    }

    #[must_use]
    pub fn setups(&self) -> usize {
        self.setups.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }
}

pub struct ProbedOperator<F> {
    f: F,
    probe: OperatorProbe,
}

impl<I, O, F> Operator<I, O> for ProbedOperator<F>
where
    F: FnMut(&I) -> Result<O> + Send,
{
    fn call(&mut self, input: &I) -> Result<O> {
        self.probe.calls.fetch_add(1, Ordering::SeqCst);
        (self.f)(input)
    }

    fn teardown(&mut self) -> Result<()> {
        self.probe.teardowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// What a [`LifoPool`] observed, readable after the pool was moved away.
#[derive(Clone, Debug, Default)]
pub struct PoolStats {
    submitted: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl PoolStats {
    #[must_use]
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Single-threaded [`WorkerPool`] that computes on submit and hands results
/// back newest first.
///
/// Nothing completes on its own ([`try_poll`](WorkerPool::try_poll) is always
/// empty), so a caller only makes progress by blocking on
/// [`get_completed`](WorkerPool::get_completed) once the pool is full.
pub struct LifoPool<I, O> {
    size: usize,
    op: String,
    f: Box<dyn FnMut(&I) -> Result<O> + Send>,
    done: Vec<Outcome<O>>,
    stats: PoolStats,
}

impl<I, O> LifoPool<I, O> {
    pub fn new<F>(size: usize, op: impl Into<String>, f: F) -> Self
    where
        F: FnMut(&I) -> Result<O> + Send + 'static,
    {
        Self {
            size: size.max(1),
            op: op.into(),
            f: Box::new(f),
            done: Vec::new(),
            stats: PoolStats::default(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.stats.clone()
    }
}

impl<I, O> WorkerPool<I, O> for LifoPool<I, O>
where
    I: Debug + Send + Sync + 'static,
    O: Send,
{
    fn size(&self) -> usize {
        self.size
    }

    fn submit(&mut self, task: Outcome<I>) -> Result<()> {
        if self.done.len() >= self.size {
            return Err(DcError::CapacityExceeded {
                capacity: self.size,
            }
            .into());
        }
        let f = &mut self.f;
        self.done.push(guard(&self.op, |x: &I| f(x), task));
        self.stats.submitted.fetch_add(1, Ordering::SeqCst);
        self.stats
            .max_in_flight
            .fetch_max(self.done.len(), Ordering::SeqCst);
        Ok(())
    }

    fn has_free_capacity(&self) -> bool {
        !self.stats.closed() && self.done.len() < self.size
    }

    fn has_completed(&self) -> bool {
        !self.done.is_empty()
    }

    fn get_completed(&mut self) -> Result<Outcome<O>> {
        match self.done.pop() {
            Some(out) => Ok(out),
            None => bail!("no task in flight"),
        }
    }

    fn try_poll(&mut self) -> Option<Outcome<O>> {
        None
    }

    fn close(&mut self) {
        self.stats.closed.store(true, Ordering::SeqCst);
    }
}
