//! Operators and operator resolution.
//!
//! An [`Operator`] is a stateful unary transformation that a worker builds once
//! and then applies to every task it receives. Operators are looked up by path
//! in an [`OperatorRegistry`]; the same type serves as the *hub* consulted by
//! remote workers and as the *local call mapping* that short-circuits parallel
//! dispatch.
//!
//! ```
//! use datacollection::ops::{OpSpec, Operator, OperatorRegistry};
//! use serde_json::json;
//!
//! let hub = OperatorRegistry::<i64, i64>::new().register("add", |spec: &OpSpec| {
//!     let n = spec.args["n"].as_i64().unwrap_or(0);
//!     Ok(move |x: &i64| Ok::<_, anyhow::Error>(x + n))
//! });
//! let mut op = hub.resolve(&OpSpec::new("add").with_args(json!({ "n": 3 }))).unwrap();
//! assert_eq!(op.call(&4).unwrap(), 7);
//! ```

use crate::error::DcError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A unary transformation with optional per-worker teardown.
pub trait Operator<I, O>: Send {
    fn call(&mut self, input: &I) -> Result<O>;

    /// Release resources held by this operator. Called once, when its worker stops.
    fn teardown(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<I, O, F> Operator<I, O> for F
where
    F: FnMut(&I) -> Result<O> + Send,
{
    fn call(&mut self, input: &I) -> Result<O> {
        self(input)
    }
}

/// Which operator to build and how: path, column index and construction arguments.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OpSpec {
    pub path: String,
    #[serde(default)]
    pub index: Vec<String>,
    #[serde(default)]
    pub args: Value,
}

impl OpSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            index: Vec::new(),
            args: Value::Null,
        }
    }

    #[must_use]
    pub fn with_index<S: Into<String>>(mut self, index: impl IntoIterator<Item = S>) -> Self {
        self.index = index.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }
}

pub type OperatorFactory<I, O> =
    Arc<dyn Fn(&OpSpec) -> Result<Box<dyn Operator<I, O>>> + Send + Sync>;

/// Path → operator factory.
///
/// Cloning is cheap; factories are shared and may be invoked from several
/// workers at the same time.
pub struct OperatorRegistry<I, O> {
    factories: HashMap<String, OperatorFactory<I, O>>,
}

impl<I, O> Clone for OperatorRegistry<I, O> {
    fn clone(&self) -> Self {
        Self {
            factories: self.factories.clone(),
        }
    }
}

impl<I, O> Default for OperatorRegistry<I, O> {
    fn default() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }
}

impl<I: 'static, O: 'static> OperatorRegistry<I, O> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory building an operator from its [`OpSpec`].
    #[must_use]
    pub fn register<Op, F>(mut self, path: impl Into<String>, factory: F) -> Self
    where
        Op: Operator<I, O> + 'static,
        F: Fn(&OpSpec) -> Result<Op> + Send + Sync + 'static,
    {
        let factory: OperatorFactory<I, O> = Arc::new(move |spec: &OpSpec| {
            factory(spec).map(|op| Box::new(op) as Box<dyn Operator<I, O>>)
        });
        self.factories.insert(path.into(), factory);
        self
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.factories.contains_key(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Build a fresh operator instance for `spec`.
    ///
    /// # Errors
    /// [`DcError::UnknownOperator`] for an unregistered path, or whatever the
    /// factory itself returns.
    pub fn resolve(&self, spec: &OpSpec) -> Result<Box<dyn Operator<I, O>>> {
        let factory = self
            .factories
            .get(&spec.path)
            .ok_or_else(|| DcError::UnknownOperator {
                path: spec.path.clone(),
            })?;
        factory(spec)
    }
}
