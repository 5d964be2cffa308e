//! Submission loops: feed a source into workers and relay the results.
//!
//! Both loops obey the same contract:
//! - at most `num_worker` tasks are in flight at any time (admission control);
//! - every result is relayed before the single end-of-stream sentinel;
//! - a consumer that goes away stops the loop early;
//! - loop-level errors are logged on the loop thread and never travel through
//!   the output sequence, which then ends without a sentinel.
//!
//! [`run_pooled`] talks to a [`WorkerPool`]; results come out in completion
//! order. [`run_buffered`] dispatches a plain function onto a rayon pool and
//! keeps a FIFO of pending calls; results come out in input order.

use crate::error::DcError;
use crate::outcome::Outcome;
use crate::output::OutputSequence;
use crate::pool::WorkerPool;
use crate::relay::{RelaySender, bounded};
use crate::task::guard;
use anyhow::{Context, Result, anyhow};
use rayon::ThreadPool;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::Arc;
use std::thread;

/// Drive `pool` over `source`, relaying results as they complete.
///
/// The loop never spins: while the pool is saturated it blocks on
/// [`WorkerPool::get_completed`], and collecting a result is exactly what
/// frees a worker. After the sentinel is queued the pool is closed, which
/// runs each worker's teardown.
///
/// # Errors
/// Pool failures (including [`DcError::CapacityExceeded`]) and
/// [`DcError::ConsumerGone`]. The pool is closed on every path.
pub fn run_pooled<I, O, S, P>(source: S, mut pool: P, relay: RelaySender<Outcome<O>>) -> Result<()>
where
    S: Iterator<Item = Outcome<I>>,
    P: WorkerPool<I, O>,
{
    let result = drive_pool(source, &mut pool, relay);
    pool.close();
    result
}

fn drive_pool<I, O, S, P>(source: S, pool: &mut P, relay: RelaySender<Outcome<O>>) -> Result<()>
where
    S: Iterator<Item = Outcome<I>>,
    P: WorkerPool<I, O>,
{
    for task in source {
        while let Some(done) = pool.try_poll() {
            relay.put(done)?;
        }
        while !pool.has_free_capacity() {
            relay.put(pool.get_completed()?)?;
        }
        pool.submit(task)?;
    }
    while pool.has_completed() {
        relay.put(pool.get_completed()?)?;
    }
    relay.finish()?;
    Ok(())
}

/// Dispatch `f` onto `executor`, keeping up to `num_worker` calls in flight.
///
/// When the buffer is full the oldest call is awaited and relayed before the
/// next one is started, so results keep the input order.
///
/// # Errors
/// [`DcError::ConsumerGone`], or a pending call whose thread went away.
pub fn run_buffered<I, O, S, F>(
    source: S,
    num_worker: usize,
    executor: &ThreadPool,
    op: &str,
    f: Arc<F>,
    relay: RelaySender<Outcome<O>>,
) -> Result<()>
where
    I: Debug + Send + Sync + 'static,
    O: Send + 'static,
    S: Iterator<Item = Outcome<I>>,
    F: Fn(&I) -> Result<O> + Send + Sync + 'static,
{
    let num_worker = num_worker.max(1);
    let op: Arc<str> = Arc::from(op);
    let mut pending = VecDeque::with_capacity(num_worker);

    for task in source {
        if pending.len() == num_worker
            && let Some(oldest) = pending.pop_front()
        {
            relay.put(await_call(&oldest)?)?;
        }
        let (tx, rx) = crossbeam_channel::bounded(1);
        let f = Arc::clone(&f);
        let op = Arc::clone(&op);
        executor.spawn(move || {
            let _ = tx.send(guard(&op, |x: &I| f(x), task));
        });
        pending.push_back(rx);
    }
    while let Some(oldest) = pending.pop_front() {
        relay.put(await_call(&oldest)?)?;
    }
    relay.finish()?;
    Ok(())
}

fn await_call<O>(rx: &crossbeam_channel::Receiver<Outcome<O>>) -> Result<Outcome<O>> {
    rx.recv()
        .map_err(|_| anyhow!("pending call dropped without a result"))
}

/// Run [`run_pooled`] on a dedicated thread and return the consuming side.
///
/// The relay holds at most `pool.size()` results.
///
/// # Errors
/// If the submission thread cannot be spawned.
pub fn spawn_pooled<I, O, S, P>(source: S, pool: P) -> Result<OutputSequence<Outcome<O>>>
where
    I: Send + 'static,
    O: Send + 'static,
    S: Iterator<Item = Outcome<I>> + Send + 'static,
    P: WorkerPool<I, O> + 'static,
{
    let (relay, mut output) = bounded(pool.size());
    let handle = thread::Builder::new()
        .name("dc-submission".to_string())
        .spawn(move || report(run_pooled(source, pool, relay)))
        .context("failed to spawn submission thread")?;
    output.attach_producer(handle);
    Ok(output)
}

/// Run [`run_buffered`] on a dedicated thread, on a fresh rayon pool of
/// `num_worker` threads.
///
/// # Errors
/// If the thread pool or the submission thread cannot be created.
pub fn spawn_buffered<I, O, S, F>(
    source: S,
    num_worker: usize,
    op: impl Into<String>,
    f: F,
) -> Result<OutputSequence<Outcome<O>>>
where
    I: Debug + Send + Sync + 'static,
    O: Send + 'static,
    S: Iterator<Item = Outcome<I>> + Send + 'static,
    F: Fn(&I) -> Result<O> + Send + Sync + 'static,
{
    let num_worker = num_worker.max(1);
    let executor = rayon::ThreadPoolBuilder::new()
        .num_threads(num_worker)
        .thread_name(|i| format!("dc-call-{i}"))
        .build()
        .context("failed to build thread pool")?;
    let op = op.into();
    let f = Arc::new(f);
    let (relay, mut output) = bounded(num_worker);
    let handle = thread::Builder::new()
        .name("dc-submission".to_string())
        .spawn(move || report(run_buffered(source, num_worker, &executor, &op, f, relay)))
        .context("failed to spawn submission thread")?;
    output.attach_producer(handle);
    Ok(output)
}

fn report(result: Result<()>) {
    match result {
        Ok(()) => log::debug!("submission loop finished"),
        Err(e) if matches!(e.downcast_ref::<DcError>(), Some(DcError::ConsumerGone)) => {
            log::debug!("submission loop stopped: {e}");
        }
        Err(e) => log::error!("submission loop failed: {e:#}"),
    }
}
