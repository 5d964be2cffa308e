//! Worker pools: fixed sets of execution units behind one interface.
//!
//! The submission loop only ever talks to a [`WorkerPool`], so any backend
//! (local threads, processes, a remote cluster) plugs in by implementing it.
//! [`ThreadWorkerPool`] is the built-in implementation: dedicated named threads,
//! each building its own [`Operator`] once at startup and tearing it down when
//! the pool closes.
//!
//! # Channel layout
//! - task channel (shared, bounded by the pool size): loop → workers
//! - completion channel (shared, bounded by the pool size): workers → loop
//! - readiness channel: workers → constructor, one report per worker
//!
//! At most `size` tasks are ever in flight, so neither bounded channel can
//! block a sender.

use crate::error::DcError;
use crate::ops::Operator;
use crate::outcome::Outcome;
use crate::task::guard;
use anyhow::{Context, Result, anyhow, bail};
use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};
use std::fmt::Debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A fixed-size set of execution units.
///
/// Callers must check [`has_free_capacity`](WorkerPool::has_free_capacity)
/// before every [`submit`](WorkerPool::submit). Results may complete in any
/// order.
pub trait WorkerPool<I, O>: Send {
    /// Number of execution units, fixed at construction.
    fn size(&self) -> usize;

    /// Hand a task to an idle unit.
    ///
    /// # Errors
    /// [`DcError::CapacityExceeded`] when no unit is idle; this is a bug in
    /// the caller's admission control, not a recoverable condition.
    fn submit(&mut self, task: Outcome<I>) -> Result<()>;

    fn has_free_capacity(&self) -> bool;

    /// Whether submitted tasks still have results to collect.
    fn has_completed(&self) -> bool;

    /// Block until the next result is available and take it. Taking a result
    /// frees the unit that produced it.
    ///
    /// # Errors
    /// Fails when nothing is in flight or every unit has exited.
    fn get_completed(&mut self) -> Result<Outcome<O>>;

    /// Take a result if one is ready, without blocking.
    fn try_poll(&mut self) -> Option<Outcome<O>>;

    /// Stop accepting work and run per-unit teardown.
    fn close(&mut self);
}

/// Builds the operator for one worker, given its id.
pub type OperatorResolver<I, O> =
    Arc<dyn Fn(usize) -> Result<Box<dyn Operator<I, O>>> + Send + Sync>;

/// Resolver handing every worker the same function.
pub fn shared_fn<I, O, F>(f: F) -> OperatorResolver<I, O>
where
    I: 'static,
    O: 'static,
    F: Fn(&I) -> Result<O> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |_worker: usize| -> Result<Box<dyn Operator<I, O>>> {
        let f = Arc::clone(&f);
        Ok(Box::new(move |x: &I| f(x)))
    })
}

/// Remove a cache directory tree. A missing directory counts as success.
///
/// # Errors
/// Any I/O error other than `NotFound`.
pub fn cleanup_cache(root: &Path) -> Result<()> {
    match std::fs::remove_dir_all(root) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("remove cache {}", root.display())),
    }
}

/// Thread-backed [`WorkerPool`].
pub struct ThreadWorkerPool<I, O> {
    workers: Vec<JoinHandle<()>>,
    task_tx: Option<Sender<Outcome<I>>>,
    done_rx: Receiver<Outcome<O>>,
    size: usize,
    in_flight: usize,
}

impl<I, O> ThreadWorkerPool<I, O>
where
    I: Debug + Send + Sync + 'static,
    O: Send + 'static,
{
    /// Spawn `size` workers and wait until each has built its operator.
    ///
    /// Each worker calls `resolver(worker_id)` exactly once. When the pool
    /// closes, every worker runs [`Operator::teardown`] and then clears
    /// `cache_root` (if any); failures there are logged and ignored.
    ///
    /// # Errors
    /// - [`DcError::InvalidConfig`] for `size == 0`
    /// - [`DcError::WorkerSetup`] as soon as one worker fails to initialize;
    ///   the workers already started are shut down first.
    pub fn new(
        size: usize,
        op_name: impl Into<String>,
        resolver: OperatorResolver<I, O>,
        cache_root: Option<PathBuf>,
    ) -> Result<Self> {
        if size == 0 {
            return Err(DcError::InvalidConfig(
                "worker pool needs at least one worker".to_string(),
            )
            .into());
        }

        let (task_tx, task_rx) = bounded::<Outcome<I>>(size);
        let (done_tx, done_rx) = bounded::<Outcome<O>>(size);
        let (ready_tx, ready_rx) = bounded::<(usize, Result<()>)>(size);
        let op_name: Arc<str> = Arc::from(op_name.into());

        // Dropping `pool` on any early return below joins what was spawned.
        let mut pool = Self {
            workers: Vec::with_capacity(size),
            task_tx: Some(task_tx),
            done_rx,
            size,
            in_flight: 0,
        };

        for worker_id in 0..size {
            let ctx = WorkerContext {
                worker_id,
                op_name: Arc::clone(&op_name),
                resolver: Arc::clone(&resolver),
                task_rx: task_rx.clone(),
                done_tx: done_tx.clone(),
                ready_tx: ready_tx.clone(),
                cache_root: cache_root.clone(),
            };
            let handle = thread::Builder::new()
                .name(format!("dc-worker-{worker_id}"))
                .spawn(move || ctx.run())
                .with_context(|| format!("failed to spawn worker thread {worker_id}"))?;
            pool.workers.push(handle);
        }
        drop(ready_tx);

        for _ in 0..size {
            match ready_rx.recv() {
                Ok((_, Ok(()))) => {}
                Ok((worker, Err(source))) => {
                    return Err(DcError::WorkerSetup { worker, source }.into());
                }
                Err(_) => bail!("worker exited before reporting readiness"),
            }
        }
        log::debug!("worker pool for {op_name} ready with {size} workers");
        Ok(pool)
    }
}

impl<I, O> ThreadWorkerPool<I, O> {
    fn shutdown(&mut self) {
        if self.task_tx.take().is_none() {
            return;
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("worker thread panicked during shutdown");
            }
        }
    }
}

impl<I, O> WorkerPool<I, O> for ThreadWorkerPool<I, O>
where
    I: Send,
    O: Send,
{
    fn size(&self) -> usize {
        self.size
    }

    fn submit(&mut self, task: Outcome<I>) -> Result<()> {
        if self.in_flight >= self.size {
            return Err(DcError::CapacityExceeded {
                capacity: self.size,
            }
            .into());
        }
        let tx = self
            .task_tx
            .as_ref()
            .ok_or_else(|| anyhow!("worker pool is closed"))?;
        tx.send(task).map_err(|_| anyhow!("all workers have exited"))?;
        self.in_flight += 1;
        Ok(())
    }

    fn has_free_capacity(&self) -> bool {
        self.task_tx.is_some() && self.in_flight < self.size
    }

    fn has_completed(&self) -> bool {
        self.in_flight > 0
    }

    fn get_completed(&mut self) -> Result<Outcome<O>> {
        if self.in_flight == 0 {
            bail!("no task in flight");
        }
        let out = self
            .done_rx
            .recv()
            .map_err(|_| anyhow!("all workers have exited"))?;
        self.in_flight -= 1;
        Ok(out)
    }

    fn try_poll(&mut self) -> Option<Outcome<O>> {
        match self.done_rx.try_recv() {
            Ok(out) => {
                self.in_flight -= 1;
                Some(out)
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    fn close(&mut self) {
        self.shutdown();
    }
}

impl<I, O> Drop for ThreadWorkerPool<I, O> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Everything one worker thread owns.
struct WorkerContext<I, O> {
    worker_id: usize,
    op_name: Arc<str>,
    resolver: OperatorResolver<I, O>,
    task_rx: Receiver<Outcome<I>>,
    done_tx: Sender<Outcome<O>>,
    ready_tx: Sender<(usize, Result<()>)>,
    cache_root: Option<PathBuf>,
}

impl<I, O> WorkerContext<I, O>
where
    I: Debug + Send + Sync + 'static,
    O: Send + 'static,
{
    fn run(self) {
        let Self {
            worker_id,
            op_name,
            resolver,
            task_rx,
            done_tx,
            ready_tx,
            cache_root,
        } = self;

        let mut op = match resolver(worker_id) {
            Ok(op) => {
                let _ = ready_tx.send((worker_id, Ok(())));
                op
            }
            Err(e) => {
                let _ = ready_tx.send((worker_id, Err(e)));
                return;
            }
        };
        drop(ready_tx);

        // Ends once the pool drops the task sender and the queue is drained.
        for task in task_rx.iter() {
            let out = guard(&op_name, |x: &I| op.call(x), task);
            if done_tx.send(out).is_err() {
                break;
            }
        }

        if let Err(e) = op.teardown() {
            log::debug!("worker {worker_id}: teardown of {op_name} failed: {e:#}");
        }
        if let Some(root) = cache_root.as_deref()
            && let Err(e) = cleanup_cache(root)
        {
            log::debug!("worker {worker_id}: {e:#}");
        }
        log::debug!("worker {worker_id} stopped");
    }
}
