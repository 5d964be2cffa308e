//! Fault-isolated parallel maps.
//!
//! Demonstrates:
//! - `try_map` on the worker-pool backend, with one failing element
//! - Chaining stages over outcomes and filtering successes
//! - `resolve` with a local call mapping, which skips the pool entirely
//!
//! Run with: cargo run --example parallel_map

use anyhow::{Result, ensure};
use datacollection::*;
use serde_json::json;

fn main() -> Result<()> {
    println!("Parallel map example\n");

    // Pool backend: results arrive in completion order.
    let config = DcConfig {
        num_worker: Some(3),
        backend: Backend::Pool,
        ..DcConfig::default()
    };
    let outcomes = DataCollection::range(10)
        .config(config)?
        .try_map("reciprocal", |x: &usize| {
            ensure!(*x != 0, "no reciprocal for zero");
            Ok(1.0 / *x as f64)
        })?
        .filter_ok(|r: &f64| *r > 0.2, false)
        .to_vec();

    println!("Pool backend, reciprocals above 0.2:");
    for outcome in &outcomes {
        match outcome {
            Outcome::Success(r) => println!("  ok    {r:.3}"),
            Outcome::Failure(f) => println!("  fail  {f}"),
        }
    }

    // A path found in the local mapping runs in place, one instance for the run.
    let local = OperatorRegistry::<i64, i64>::new().register("ops/scale", |spec: &OpSpec| {
        let factor = spec.args["factor"].as_i64().unwrap_or(1);
        Ok(move |x: &i64| -> Result<i64> { Ok(x * factor) })
    });
    let hub = OperatorRegistry::new();
    let spec = OpSpec::new("ops/scale").with_args(json!({ "factor": 4 }));

    let scaled = DataCollection::of(vec![1_i64, 2, 3])
        .resolve(&local, &hub, &spec)?
        .successes()
        .to_vec();
    println!("\nLocal call mapping, scaled by 4: {scaled:?}");

    println!("\nDone");
    Ok(())
}
