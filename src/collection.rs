//! [`DataCollection`]: a chainable wrapper over a list or a lazy stream.
//!
//! A collection is backed either by a `Vec` (eager, random access, mutable
//! through the list methods) or by a boxed iterator (lazy, single pass). The
//! backing is fixed at construction and inherited: transforming a list gives a
//! list, transforming a stream gives a stream. [`stream`](DataCollection::stream)
//! and [`unstream`](DataCollection::unstream) switch explicitly.
//!
//! Fault-isolated transformations ([`try_map`](DataCollection::try_map) and
//! friends) run on the configured [`Backend`] and yield [`Outcome`]s.

use crate::config::{Backend, DcConfig, RuntimeEnv};
use crate::error::DcError;
use crate::io::expand_glob;
use crate::ops::{OpSpec, Operator, OperatorRegistry};
use crate::outcome::{Failure, Outcome};
use crate::output::OutputSequence;
use crate::pool::{OperatorResolver, ThreadWorkerPool, WorkerPool, shared_fn};
use crate::submit::{spawn_buffered, spawn_pooled};
use crate::task::{guard, lift};
use crate::window::{Batches, Rolling};
use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fmt::{self, Debug};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub trait Element: 'static + Send {}
impl<T> Element for T where T: 'static + Send {}

type BoxIter<T> = Box<dyn Iterator<Item = T> + Send>;

enum Source<T> {
    List(Vec<T>),
    Stream(BoxIter<T>),
}

pub struct DataCollection<T> {
    src: Source<T>,
    config: DcConfig,
}

impl<T> Debug for DataCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backing = match &self.src {
            Source::List(v) => format!("list({})", v.len()),
            Source::Stream(_) => "stream".to_string(),
        };
        f.debug_struct("DataCollection")
            .field("backing", &backing)
            .field("config", &self.config)
            .finish()
    }
}

// ---- construction ----
impl<T: Element> DataCollection<T> {
    /// List-backed collection.
    pub fn of(data: Vec<T>) -> Self {
        Self {
            src: Source::List(data),
            config: DcConfig::default(),
        }
    }

    /// Stream-backed collection, consumed lazily and only once.
    pub fn from_stream<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self {
            src: Source::Stream(Box::new(iter.into_iter())),
            config: DcConfig::default(),
        }
    }

    /// Child collection over `f(elements)`, list if `self` is a list.
    fn derive<O, I, F>(self, f: F) -> DataCollection<O>
    where
        O: Element,
        I: Iterator<Item = O> + Send + 'static,
        F: FnOnce(BoxIter<T>) -> I,
    {
        let Self { src, config } = self;
        let src = match src {
            Source::List(v) => Source::List(f(Box::new(v.into_iter())).collect()),
            Source::Stream(it) => Source::Stream(Box::new(f(it))),
        };
        DataCollection { src, config }
    }

    /// Child collection over an output sequence built from `self`'s elements.
    fn attach<O, F>(self, spawn: F) -> Result<DataCollection<O>>
    where
        O: Element,
        F: FnOnce(BoxIter<T>) -> Result<OutputSequence<O>>,
    {
        let Self { src, config } = self;
        let src = match src {
            Source::List(v) => Source::List(spawn(Box::new(v.into_iter()))?.collect()),
            Source::Stream(it) => Source::Stream(Box::new(spawn(it)?)),
        };
        Ok(DataCollection { src, config })
    }
}

impl DataCollection<usize> {
    /// Stream over `0..n`.
    pub fn range(n: usize) -> Self {
        Self::from_stream(0..n)
    }
}

impl DataCollection<PathBuf> {
    /// Stream over the files matching `patterns`, sorted per pattern.
    ///
    /// # Errors
    /// See [`expand_glob`]; in particular [`DcError::NoMatchingFiles`].
    pub fn from_glob<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        Ok(Self::from_stream(expand_glob(patterns)?))
    }
}

impl<T: Element> From<Vec<T>> for DataCollection<T> {
    fn from(data: Vec<T>) -> Self {
        Self::of(data)
    }
}

impl<T: Element> FromIterator<T> for DataCollection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::of(iter.into_iter().collect())
    }
}

impl<T: Element> IntoIterator for DataCollection<T> {
    type Item = T;
    type IntoIter = BoxIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        match self.src {
            Source::List(v) => Box::new(v.into_iter()),
            Source::Stream(it) => it,
        }
    }
}

// ---- configuration ----
impl<T: Element> DataCollection<T> {
    #[must_use]
    pub fn get_config(&self) -> &DcConfig {
        &self.config
    }

    /// Replace the configuration; children inherit it.
    ///
    /// # Errors
    /// [`DcError::InvalidConfig`] if `config` does not validate.
    pub fn config(mut self, config: DcConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Run fault-isolated maps on `n` threads, `0` meaning one per CPU.
    #[must_use]
    pub fn set_parallel(mut self, n: usize) -> Self {
        let n = if n == 0 { num_cpus::get() } else { n };
        self.config.num_worker = Some(n);
        self.config.backend = Backend::Threaded;
        self
    }

    /// Switch to the worker-pool backend with the given runtime environment.
    #[must_use]
    pub fn start_backend(mut self, env: RuntimeEnv) -> Self {
        let env = env.normalized();
        log::info!(
            "starting pool backend at {}",
            env.address.as_deref().unwrap_or("local threads")
        );
        self.config.runtime = Some(env);
        self.config.backend = Backend::Pool;
        self
    }

    #[must_use]
    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.cache_root = Some(root.into());
        self
    }

    #[must_use]
    pub fn is_stream(&self) -> bool {
        matches!(self.src, Source::Stream(_))
    }

    /// Effective worker count.
    #[must_use]
    pub fn num_worker(&self) -> usize {
        self.config.effective_workers()
    }

    #[must_use]
    pub fn stream(self) -> Self {
        match self.src {
            Source::List(v) => Self {
                src: Source::Stream(Box::new(v.into_iter())),
                config: self.config,
            },
            src @ Source::Stream(_) => Self { src, config: self.config },
        }
    }

    /// Materialize into a list, draining a stream.
    #[must_use]
    pub fn unstream(self) -> Self {
        match self.src {
            Source::Stream(it) => Self {
                src: Source::List(it.collect()),
                config: self.config,
            },
            src @ Source::List(_) => Self { src, config: self.config },
        }
    }
}

// ---- element-wise transformations ----
impl<T: Element> DataCollection<T> {
    pub fn map<O, F>(self, f: F) -> DataCollection<O>
    where
        O: Element,
        F: Fn(&T) -> O + Send + 'static,
    {
        self.derive(move |it| it.map(move |x| f(&x)))
    }

    #[must_use]
    pub fn filter<F>(self, pred: F) -> Self
    where
        F: Fn(&T) -> bool + Send + 'static,
    {
        self.derive(move |it| it.filter(move |x| pred(x)))
    }

    pub fn flat_map<O, F>(self, f: F) -> DataCollection<O>
    where
        O: Element,
        F: Fn(&T) -> Vec<O> + Send + 'static,
    {
        self.derive(move |it| it.flat_map(move |x| f(&x)))
    }

    /// Pair up elements; stops at the shorter side.
    pub fn zip<U: Element>(self, other: DataCollection<U>) -> DataCollection<(T, U)> {
        self.derive(move |it| it.zip(other))
    }

    #[must_use]
    pub fn chain(self, other: DataCollection<T>) -> Self {
        self.derive(move |it| it.chain(other))
    }

    /// First `n` elements. Safe on unbounded streams.
    #[must_use]
    pub fn head(self, n: usize) -> Self {
        self.derive(move |it| it.take(n))
    }

    /// Non-overlapping chunks of `size`; a short last chunk is kept unless `drop_tail`.
    pub fn batch(self, size: usize, drop_tail: bool) -> DataCollection<Vec<T>> {
        self.derive(move |it| Batches::new(it, size, drop_tail))
    }

    /// Keep each element with probability `ratio`, reproducibly for a given `seed`.
    ///
    /// # Errors
    /// [`DcError::InvalidConfig`] unless `0.0 <= ratio <= 1.0`.
    pub fn sample(self, ratio: f64, seed: u64) -> Result<Self> {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(DcError::InvalidConfig(format!(
                "sample ratio must be within [0, 1], got {ratio}"
            ))
            .into());
        }
        let mut rng = StdRng::seed_from_u64(seed);
        Ok(self.derive(move |it| it.filter(move |_| rng.random_bool(ratio))))
    }
}

impl<T: Element + Clone> DataCollection<T> {
    /// Sliding windows, see [`Rolling`].
    pub fn rolling(
        self,
        size: usize,
        step: usize,
        drop_head: bool,
        drop_tail: bool,
    ) -> DataCollection<Vec<T>> {
        self.derive(move |it| Rolling::new(it, size, step, drop_head, drop_tail))
    }
}

impl<T> DataCollection<T>
where
    T: Element + IntoIterator,
    T::Item: Element,
    T::IntoIter: Send + 'static,
{
    pub fn flatten(self) -> DataCollection<T::Item> {
        self.derive(|it| it.flatten())
    }
}

// ---- fault-isolated maps ----
impl<T: Element + Debug + Sync> DataCollection<T> {
    fn lifted(self) -> DataCollection<Outcome<T>> {
        self.derive(|it| it.map(lift))
    }

    /// Apply a fallible `f` to every element on the configured backend.
    ///
    /// Errors and panics in `f` become [`Failure`]s. With [`Backend::Pool`]
    /// results arrive in completion order; the other backends keep input order.
    ///
    /// On a parallel backend, if the submission loop dies without reaching the
    /// end of its input, the output simply ends early. The truncation is logged
    /// at `error` but not visible in the elements, so compare counts when a
    /// complete run matters.
    ///
    /// # Errors
    /// Only if the threads backing a parallel backend cannot be started.
    pub fn try_map<O, F>(
        self,
        op: impl Into<String>,
        f: F,
    ) -> Result<DataCollection<Outcome<O>>>
    where
        O: Element,
        F: Fn(&T) -> Result<O> + Send + Sync + 'static,
    {
        self.lifted().and_then(op, f)
    }

    /// Apply the operator described by `spec`, see [`DataCollection::and_then_resolve`].
    ///
    /// A pooled run that loses its submission loop ends early, as described
    /// for [`try_map`](DataCollection::try_map).
    ///
    /// # Errors
    /// As [`DataCollection::and_then_resolve`].
    pub fn resolve<O: Element>(
        self,
        local: &OperatorRegistry<T, O>,
        hub: &OperatorRegistry<T, O>,
        spec: &OpSpec,
    ) -> Result<DataCollection<Outcome<O>>> {
        self.lifted().and_then_resolve(local, hub, spec)
    }

    /// Run every element through a caller-supplied pool.
    ///
    /// # Errors
    /// If the submission thread cannot be spawned.
    pub fn dispatch<O, P>(self, pool: P) -> Result<DataCollection<Outcome<O>>>
    where
        O: Element,
        P: WorkerPool<T, O> + 'static,
    {
        self.lifted().and_then_dispatch(pool)
    }
}

impl<I: Element + Debug + Sync> DataCollection<Outcome<I>> {
    /// [`try_map`](DataCollection::try_map) over successes; failures pass through.
    ///
    /// # Errors
    /// Only if the threads backing a parallel backend cannot be started.
    pub fn and_then<O, F>(
        self,
        op: impl Into<String>,
        f: F,
    ) -> Result<DataCollection<Outcome<O>>>
    where
        O: Element,
        F: Fn(&I) -> Result<O> + Send + Sync + 'static,
    {
        let op = op.into();
        let k = self.num_worker();
        let backend = self.config.backend;
        match backend {
            Backend::Local => {
                Ok(self.derive(move |it| it.map(move |t| guard(&op, |x: &I| f(x), t))))
            }
            Backend::Threaded => self.attach(|src| spawn_buffered(src, k, op, f)),
            Backend::Pool => {
                let cache_root = self.config.cache_root.clone();
                let pool = ThreadWorkerPool::new(k, op, shared_fn(f), cache_root)?;
                self.attach(|src| spawn_pooled(src, pool))
            }
        }
    }

    /// Apply the operator named by `spec.path`.
    ///
    /// A path found in `local` is built once and applied on the consuming
    /// thread, without any worker. Otherwise a pool of
    /// [`num_worker`](DataCollection::num_worker) workers is started, each
    /// building its own instance from `hub`; when the input is exhausted every
    /// worker tears its operator down and clears the cache root.
    ///
    /// # Errors
    /// [`DcError::UnknownOperator`] if neither registry knows the path, errors
    /// from building the local operator, or [`DcError::WorkerSetup`].
    pub fn and_then_resolve<O: Element>(
        self,
        local: &OperatorRegistry<I, O>,
        hub: &OperatorRegistry<I, O>,
        spec: &OpSpec,
    ) -> Result<DataCollection<Outcome<O>>> {
        if local.contains(&spec.path) {
            let op = local.resolve(spec)?;
            log::debug!("{} found in local call mapping, running in place", spec.path);
            let name = spec.path.clone();
            return Ok(self.derive(move |it| LocalCalls {
                src: it,
                name,
                op: Some(op),
            }));
        }
        if !hub.contains(&spec.path) {
            return Err(DcError::UnknownOperator {
                path: spec.path.clone(),
            }
            .into());
        }

        let hub = hub.clone();
        let worker_spec = spec.clone();
        let resolver: OperatorResolver<I, O> =
            Arc::new(move |_worker: usize| hub.resolve(&worker_spec));
        let pool = ThreadWorkerPool::new(
            self.num_worker(),
            spec.path.clone(),
            resolver,
            self.config.effective_cache_root(),
        )?;
        self.attach(|src| spawn_pooled(src, pool))
    }

    /// # Errors
    /// If the submission thread cannot be spawned.
    pub fn and_then_dispatch<O, P>(self, pool: P) -> Result<DataCollection<Outcome<O>>>
    where
        O: Element,
        P: WorkerPool<I, O> + 'static,
    {
        self.attach(|src| spawn_pooled(src, pool))
    }
}

impl<I: Element> DataCollection<Outcome<I>> {
    /// Infallible map over successes.
    pub fn map_ok<O, F>(self, f: F) -> DataCollection<Outcome<O>>
    where
        O: Element,
        F: Fn(&I) -> O + Send + 'static,
    {
        self.derive(move |it| it.map(move |o| o.map(|x| f(&x))))
    }

    /// Keep successes whose value satisfies `pred`. Failures are kept as they
    /// are unless `drop_failures` is set.
    #[must_use]
    pub fn filter_ok<F>(self, pred: F, drop_failures: bool) -> Self
    where
        F: Fn(&I) -> bool + Send + 'static,
    {
        self.derive(move |it| {
            it.filter(move |o| match o {
                Outcome::Success(x) => pred(x),
                Outcome::Failure(_) => !drop_failures,
            })
        })
    }

    #[must_use]
    pub fn drop_failures(self) -> Self {
        self.derive(|it| it.filter(Outcome::is_success))
    }

    pub fn successes(self) -> DataCollection<I> {
        self.derive(|it| it.filter_map(Outcome::success))
    }

    pub fn failures(self) -> DataCollection<Failure> {
        self.derive(|it| it.filter_map(|o| o.into_result().err()))
    }
}

/// Operator from the local call mapping, applied in place.
struct LocalCalls<I, O> {
    src: BoxIter<Outcome<I>>,
    name: String,
    op: Option<Box<dyn Operator<I, O>>>,
}

impl<I, O> Iterator for LocalCalls<I, O>
where
    I: Debug + Send + Sync + 'static,
{
    type Item = Outcome<O>;

    fn next(&mut self) -> Option<Outcome<O>> {
        let op = self.op.as_mut()?;
        if let Some(task) = self.src.next() {
            return Some(guard(&self.name, |x: &I| op.call(x), task));
        }
        if let Some(mut op) = self.op.take()
            && let Err(e) = op.teardown()
        {
            log::debug!("teardown of {} failed: {e:#}", self.name);
        }
        None
    }
}

// ---- sinks ----
impl<T: Element> DataCollection<T> {
    /// Drive the collection to the end, discarding elements.
    pub fn run(self) {
        self.into_iter().for_each(drop);
    }

    pub fn for_each<F: FnMut(&T)>(self, mut f: F) {
        for x in self {
            f(&x);
        }
    }

    #[doc(alias = "to_list")]
    pub fn to_vec(self) -> Vec<T> {
        match self.src {
            Source::List(v) => v,
            Source::Stream(it) => it.collect(),
        }
    }
}

impl<T: Element + Serialize> DataCollection<T> {
    /// Write every element as one JSON line.
    ///
    /// # Errors
    /// See [`write_jsonl`](crate::io::write_jsonl).
    pub fn to_jsonl(self, path: impl AsRef<Path>) -> Result<usize> {
        crate::io::write_jsonl(path, self)
    }
}

// ---- list capability ----
impl<T: Element> DataCollection<T> {
    fn list(&self, op: &'static str) -> Result<&Vec<T>, DcError> {
        match &self.src {
            Source::List(v) => Ok(v),
            Source::Stream(_) => Err(DcError::NotAList { op }),
        }
    }

    fn list_mut(&mut self, op: &'static str) -> Result<&mut Vec<T>, DcError> {
        match &mut self.src {
            Source::List(v) => Ok(v),
            Source::Stream(_) => Err(DcError::NotAList { op }),
        }
    }

    /// # Errors
    /// [`DcError::NotAList`] for streams; the same holds for every list method below.
    pub fn len(&self) -> Result<usize, DcError> {
        Ok(self.list("len")?.len())
    }

    /// # Errors
    /// [`DcError::NotAList`] for streams.
    pub fn is_empty(&self) -> Result<bool, DcError> {
        Ok(self.list("is_empty")?.is_empty())
    }

    /// # Errors
    /// [`DcError::NotAList`], or [`DcError::IndexOutOfRange`].
    pub fn get(&self, index: usize) -> Result<&T, DcError> {
        let v = self.list("get")?;
        v.get(index).ok_or(DcError::IndexOutOfRange { index, len: v.len() })
    }

    /// Replace the element at `index`, returning the old one.
    ///
    /// # Errors
    /// [`DcError::NotAList`], or [`DcError::IndexOutOfRange`].
    pub fn set(&mut self, index: usize, value: T) -> Result<T, DcError> {
        let v = self.list_mut("set")?;
        let len = v.len();
        let slot = v.get_mut(index).ok_or(DcError::IndexOutOfRange { index, len })?;
        Ok(std::mem::replace(slot, value))
    }

    /// # Errors
    /// [`DcError::NotAList`] for streams.
    pub fn append(&mut self, value: T) -> Result<(), DcError> {
        self.list_mut("append")?.push(value);
        Ok(())
    }

    /// # Errors
    /// [`DcError::NotAList`] for streams.
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, values: I) -> Result<(), DcError> {
        self.list_mut("extend")?.extend(values);
        Ok(())
    }

    /// # Errors
    /// [`DcError::NotAList`], or [`DcError::IndexOutOfRange`] for `index > len`.
    pub fn insert(&mut self, index: usize, value: T) -> Result<(), DcError> {
        let v = self.list_mut("insert")?;
        if index > v.len() {
            return Err(DcError::IndexOutOfRange { index, len: v.len() });
        }
        v.insert(index, value);
        Ok(())
    }

    /// # Errors
    /// [`DcError::NotAList`] for streams.
    pub fn pop(&mut self) -> Result<Option<T>, DcError> {
        Ok(self.list_mut("pop")?.pop())
    }

    /// # Errors
    /// [`DcError::NotAList`], or [`DcError::IndexOutOfRange`].
    pub fn remove(&mut self, index: usize) -> Result<T, DcError> {
        let v = self.list_mut("remove")?;
        if index >= v.len() {
            return Err(DcError::IndexOutOfRange { index, len: v.len() });
        }
        Ok(v.remove(index))
    }

    /// # Errors
    /// [`DcError::NotAList`] for streams.
    pub fn reverse(&mut self) -> Result<(), DcError> {
        self.list_mut("reverse")?.reverse();
        Ok(())
    }

    /// # Errors
    /// [`DcError::NotAList`] for streams.
    pub fn clear(&mut self) -> Result<(), DcError> {
        self.list_mut("clear")?.clear();
        Ok(())
    }

    /// Shuffle in place, reproducibly for a given `seed`.
    ///
    /// # Errors
    /// [`DcError::NotAList`] for streams.
    pub fn shuffle(&mut self, seed: u64) -> Result<(), DcError> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.list_mut("shuffle")?.shuffle(&mut rng);
        Ok(())
    }
}

impl<T: Element + Ord> DataCollection<T> {
    /// # Errors
    /// [`DcError::NotAList`] for streams.
    pub fn sort(&mut self) -> Result<(), DcError> {
        self.list_mut("sort")?.sort();
        Ok(())
    }
}

impl<T: Element + PartialEq> DataCollection<T> {
    /// Number of elements equal to `value`.
    ///
    /// # Errors
    /// [`DcError::NotAList`] for streams.
    pub fn count(&self, value: &T) -> Result<usize, DcError> {
        Ok(self.list("count")?.iter().filter(|x| *x == value).count())
    }
}

impl<T: Element + Clone> DataCollection<T> {
    /// Independent list copy with the same configuration.
    ///
    /// # Errors
    /// [`DcError::NotAList`] for streams.
    pub fn copy(&self) -> Result<Self, DcError> {
        Ok(Self {
            src: Source::List(self.list("copy")?.clone()),
            config: self.config.clone(),
        })
    }
}
