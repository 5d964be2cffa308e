//! Testing utilities for collections and worker pools.
//!
//! - **Assertions**: compare collection outputs, with or without order, and
//!   inspect per-element outcomes
//! - **Doubles**: an [`OperatorProbe`] counting setups, calls and teardowns,
//!   and a [`LifoPool`] completing tasks out of order on demand
//!
//! # Quick Start
//!
//! ```
//! use datacollection::*;
//! use datacollection::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let out = DataCollection::of(vec![3, 1, 2])
//!     .dispatch(LifoPool::new(3, "double", |x: &i32| Ok(x * 2)))?
//!     .to_vec();
//!
//! assert_collections_unordered_equal(&successes_of(&out), &[2, 4, 6]);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod doubles;

pub use assertions::*;
pub use doubles::*;
