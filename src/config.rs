//! Execution configuration carried by every [`DataCollection`](crate::DataCollection).
//!
//! A configuration is inherited by every child collection, so setting it once
//! near the source applies to the whole chain:
//!
//! ```
//! use datacollection::*;
//!
//! let dc = DataCollection::range(10).set_parallel(4);
//! assert_eq!(dc.get_config().num_worker, Some(4));
//! assert_eq!(dc.get_config().backend, Backend::Threaded);
//! ```
//!
//! It also loads from JSON, which is how deployment settings are usually kept:
//!
//! ```
//! use datacollection::config::DcConfig;
//!
//! let cfg = DcConfig::from_json_str(r#"{ "num_worker": 3, "backend": "pool" }"#).unwrap();
//! assert_eq!(cfg.effective_workers(), 3);
//! ```

use crate::error::DcError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Worker count used when none is configured.
pub const DEFAULT_NUM_WORKER: usize = 2;

/// Package name shipped to remote workers so they can run this crate's code.
pub const SELF_PACKAGE: &str = env!("CARGO_PKG_NAME");

/// Where fault-isolated transformations run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// On the consuming thread, lazily.
    #[default]
    Local,
    /// On a thread pool, with at most `num_worker` calls in flight.
    Threaded,
    /// On a pool of dedicated workers with one-time setup and teardown.
    Pool,
}

/// Runtime environment for a remote cluster.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeEnv {
    /// Cluster entry point, e.g. `ray://localhost:10001`. `None` means in-process.
    #[serde(default)]
    pub address: Option<String>,
    /// Local code modules the transformations depend on.
    #[serde(default)]
    pub local_packages: Vec<String>,
    /// External packages the transformations depend on.
    #[serde(default)]
    pub pip_packages: Vec<String>,
    #[serde(default = "default_true")]
    pub silence: bool,
}

fn default_true() -> bool {
    true
}

impl RuntimeEnv {
    pub fn new(address: Option<String>) -> Self {
        Self {
            address,
            silence: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_local_packages<S: Into<String>>(
        mut self,
        pkgs: impl IntoIterator<Item = S>,
    ) -> Self {
        self.local_packages = pkgs.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_pip_packages<S: Into<String>>(mut self, pkgs: impl IntoIterator<Item = S>) -> Self {
        self.pip_packages = pkgs.into_iter().map(Into::into).collect();
        self
    }

    /// Complete the package lists for shipping.
    ///
    /// A remote cluster needs this crate itself, so it is appended to
    /// `pip_packages` unless an address is absent or either list already names it.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        let listed = self
            .local_packages
            .iter()
            .chain(self.pip_packages.iter())
            .any(|p| p == SELF_PACKAGE);
        if self.address.is_some() && !listed {
            self.pip_packages.push(SELF_PACKAGE.to_string());
        }
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcConfig {
    /// Number of parallel workers; [`DEFAULT_NUM_WORKER`] when unset.
    #[serde(default)]
    pub num_worker: Option<usize>,
    #[serde(default)]
    pub backend: Backend,
    /// Cache directory cleared by every pool worker on teardown.
    #[serde(default)]
    pub cache_root: Option<PathBuf>,
    /// Set once a backend has been started.
    #[serde(default)]
    pub runtime: Option<RuntimeEnv>,
}

impl DcConfig {
    /// # Errors
    /// On malformed JSON or a zero worker count.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s).context("parse config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    /// If the file cannot be read or [`DcConfig::from_json_str`] fails.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&s).with_context(|| format!("load config {}", path.display()))
    }

    /// # Errors
    /// Serialization failures (not expected for this type).
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialize config")
    }

    /// # Errors
    /// [`DcError::InvalidConfig`] when `num_worker` is zero.
    pub fn validate(&self) -> Result<(), DcError> {
        if self.num_worker == Some(0) {
            return Err(DcError::InvalidConfig(
                "num_worker must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn effective_workers(&self) -> usize {
        self.num_worker.unwrap_or(DEFAULT_NUM_WORKER)
    }

    /// Configured cache root, or `$HOME/.datacollection/operators`.
    #[must_use]
    pub fn effective_cache_root(&self) -> Option<PathBuf> {
        self.cache_root.clone().or_else(default_cache_root)
    }

    #[must_use]
    pub fn backend_started(&self) -> bool {
        self.runtime.is_some()
    }
}

fn default_cache_root() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .map(|home| home.join(".datacollection").join("operators"))
}
