//! Assertions over collection outputs.

use crate::outcome::{Failure, Outcome};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Assert that two collections are equal in order and content.
///
/// # Panics
///
/// Panics if the collections differ in length or at any index.
///
/// # Example
///
/// ```
/// use datacollection::testing::assert_collections_equal;
///
/// assert_collections_equal(&[1, 2, 3], &[1, 2, 3]);
/// ```
pub fn assert_collections_equal<T: Debug + PartialEq>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert_eq!(
            a, e,
            "Collection mismatch at index {i}:\n  Expected: {e:?}\n  Actual: {a:?}\n  Full actual: {actual:?}"
        );
    }
}

/// Assert that two collections hold the same elements with the same
/// multiplicities, in any order.
///
/// Use it for outputs of [`Backend::Pool`](crate::Backend::Pool), which
/// arrive in completion order.
///
/// # Panics
///
/// Panics if any element occurs a different number of times on each side.
///
/// # Example
///
/// ```
/// use datacollection::testing::assert_collections_unordered_equal;
///
/// assert_collections_unordered_equal(&[3, 1, 2, 1], &[1, 1, 2, 3]);
/// ```
pub fn assert_collections_unordered_equal<T: Debug + Eq + Hash>(actual: &[T], expected: &[T]) {
    fn count<T: Eq + Hash>(xs: &[T]) -> HashMap<&T, usize> {
        let mut m = HashMap::new();
        for x in xs {
            *m.entry(x).or_default() += 1;
        }
        m
    }
    let (a, e) = (count(actual), count(expected));
    if a != e {
        let missing: Vec<_> = e.keys().filter(|k| a.get(*k) != e.get(*k)).collect();
        let extra: Vec<_> = a.keys().filter(|k| !e.contains_key(*k)).collect();
        panic!(
            "Collection content mismatch:\n  Missing or miscounted: {missing:?}\n  Extra: {extra:?}\n  Expected: {expected:?}\n  Actual: {actual:?}"
        );
    }
}

/// Assert that every element satisfies `predicate`.
///
/// # Panics
///
/// Panics on the first element that does not.
pub fn assert_all<T: Debug>(collection: &[T], predicate: impl Fn(&T) -> bool) {
    for (i, item) in collection.iter().enumerate() {
        assert!(
            predicate(item),
            "Predicate failed for element at index {i}:\n  Element: {item:?}\n  Collection: {collection:?}"
        );
    }
}

/// Clone out the successful values, in order.
pub fn successes_of<T: Clone>(outcomes: &[Outcome<T>]) -> Vec<T> {
    outcomes
        .iter()
        .filter_map(|o| o.as_ref().success().cloned())
        .collect()
}

/// The failures, in order.
pub fn failures_of<T>(outcomes: &[Outcome<T>]) -> Vec<&Failure> {
    outcomes.iter().filter_map(Outcome::failure).collect()
}

/// Assert that exactly the inputs in `expected` (any order) failed, and
/// return the failures.
///
/// # Panics
///
/// Panics if a failure's input is not an `I`, or the failed inputs differ.
///
/// # Example
///
/// ```
/// use datacollection::*;
/// use datacollection::testing::assert_failed_inputs;
///
/// # fn main() -> anyhow::Result<()> {
/// let out = DataCollection::of(vec![1, -1, 2])
///     .try_map("non_negative", |x: &i32| {
///         anyhow::ensure!(*x >= 0, "negative");
///         Ok(*x)
///     })?
///     .to_vec();
/// let failures = assert_failed_inputs(&out, &[-1]);
/// assert_eq!(failures[0].op(), "non_negative");
/// # Ok(())
/// # }
/// ```
pub fn assert_failed_inputs<'a, T, I>(outcomes: &'a [Outcome<T>], expected: &[I]) -> Vec<&'a Failure>
where
    I: Debug + Eq + Hash + Clone + 'static,
{
    let failures = failures_of(outcomes);
    let inputs: Vec<I> = failures
        .iter()
        .map(|f| {
            f.input::<I>()
                .cloned()
                .unwrap_or_else(|| panic!("failure input has an unexpected type: {f:?}"))
        })
        .collect();
    assert_collections_unordered_equal(&inputs, expected);
    failures
}
