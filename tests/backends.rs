use anyhow::Result;
use datacollection::testing::*;
use datacollection::*;
use serde_json::json;
use std::thread;
use std::time::Duration;

fn ten_over(x: &i32) -> Result<i32> {
    anyhow::ensure!(*x != 0, "division by zero");
    Ok(10 / x)
}

fn pool_config(num_worker: usize, cache_root: &std::path::Path) -> DcConfig {
    DcConfig {
        num_worker: Some(num_worker),
        backend: Backend::Pool,
        cache_root: Some(cache_root.to_path_buf()),
        runtime: None,
    }
}

#[test]
fn local_backend_isolates_failures_in_order() -> Result<()> {
    let out = DataCollection::of(vec![1, 2, 0, 3])
        .try_map("ten_over", ten_over)?
        .to_vec();

    assert_eq!(out.len(), 4);
    assert_collections_equal(&successes_of(&out), &[10, 5, 3]);
    let failures = assert_failed_inputs(&out, &[0]);
    assert_eq!(failures[0].cause().to_string(), "division by zero");
    Ok(())
}

#[test]
fn threaded_backend_keeps_order() -> Result<()> {
    let out = DataCollection::range(30)
        .set_parallel(4)
        .try_map("slow_double", |x: &usize| {
            thread::sleep(Duration::from_millis((30 - *x) as u64));
            Ok(x * 2)
        })?
        .successes()
        .to_vec();
    assert_collections_equal(&out, &(0..30).map(|x| x * 2).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn set_parallel_zero_uses_every_cpu() {
    let dc = DataCollection::range(1).set_parallel(0);
    assert!(dc.num_worker() >= 1);
    assert_eq!(dc.get_config().backend, Backend::Threaded);
}

#[test]
fn pool_backend_squares_with_two_workers() -> Result<()> {
    let cache = tempfile::tempdir()?;
    let out = DataCollection::range(5)
        .config(pool_config(2, cache.path()))?
        .try_map("square", |x: &usize| Ok(x * x))?
        .successes()
        .to_vec();
    assert_collections_unordered_equal(&out, &[0, 1, 4, 9, 16]);
    Ok(())
}

#[test]
fn pool_backend_on_a_list_is_materialized() -> Result<()> {
    let cache = tempfile::tempdir()?;
    let dc = DataCollection::of(vec![1, 2, 0, 3])
        .config(pool_config(2, cache.path()))?
        .try_map("ten_over", ten_over)?;
    assert!(!dc.is_stream());
    assert_eq!(dc.len()?, 4);

    let out = dc.to_vec();
    assert_collections_unordered_equal(&successes_of(&out), &[10, 5, 3]);
    assert_failed_inputs(&out, &[0]);
    Ok(())
}

#[test]
fn failures_flow_through_chained_stages() -> Result<()> {
    let out = DataCollection::of(vec![1, 0, 5])
        .try_map("ten_over", ten_over)?
        .and_then("minus_two", |x: &i32| {
            anyhow::ensure!(*x != 10, "ten is not allowed");
            Ok(x - 2)
        })?
        .map_ok(|x: &i32| x * 100)
        .to_vec();

    assert_collections_equal(&successes_of(&out), &[0]);
    let failures = failures_of(&out);
    assert_eq!(failures.len(), 2);
    // The division failure keeps its original stage and input.
    assert_eq!(failures[1].op(), "ten_over");
    assert_eq!(failures[1].input::<i32>(), Some(&0));
    assert_eq!(failures[0].op(), "minus_two");
    assert_eq!(failures[0].input::<i32>(), Some(&10));
    Ok(())
}

#[test]
fn outcome_filters() -> Result<()> {
    let outcomes = || {
        DataCollection::of(vec![2, 0, 5]).try_map("ten_over", ten_over)
    };
    assert_eq!(outcomes()?.drop_failures().len()?, 2);
    assert_eq!(outcomes()?.successes().to_vec(), vec![5, 2]);
    let failures = outcomes()?.failures().to_vec();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].input_repr(), "0");
    Ok(())
}

#[test]
fn dispatch_runs_a_custom_pool() -> Result<()> {
    let pool = LifoPool::new(2, "triple", |x: &i32| Ok(x * 3));
    let stats = pool.stats();
    let out = DataCollection::from_stream(vec![1, 2, 3, 4])
        .dispatch(pool)?
        .successes()
        .to_vec();

    assert_collections_equal(&out, &[6, 9, 12, 3]);
    assert_eq!(stats.max_in_flight(), 2);
    assert!(stats.closed());
    Ok(())
}

fn registries(probe: &OperatorProbe) -> OperatorRegistry<i32, i32> {
    let probe = probe.clone();
    OperatorRegistry::new().register("ops/add", move |spec: &OpSpec| {
        let n = spec.args["n"].as_i64().unwrap_or(0) as i32;
        Ok(probe.operator(move |x: &i32| Ok(x + n)))
    })
}

#[test]
fn local_call_mapping_bypasses_the_pool() -> Result<()> {
    let local_probe = OperatorProbe::new();
    let hub_probe = OperatorProbe::new();
    let local = registries(&local_probe);
    let hub = registries(&hub_probe);
    let spec = OpSpec::new("ops/add").with_args(json!({ "n": 10 }));

    let dc = DataCollection::range(4).map(|x: &usize| *x as i32);
    let out = dc.resolve(&local, &hub, &spec)?.successes().to_vec();

    assert_collections_equal(&out, &[10, 11, 12, 13]);
    assert_eq!(local_probe.setups(), 1);
    assert_eq!(local_probe.calls(), 4);
    assert_eq!(local_probe.teardowns(), 1);
    assert_eq!(hub_probe.setups(), 0);
    Ok(())
}

#[test]
fn hub_operator_runs_on_workers_and_clears_the_cache() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cache = dir.path().join("operators");
    std::fs::create_dir_all(cache.join("ops-add"))?;

    let hub_probe = OperatorProbe::new();
    let hub = registries(&hub_probe);
    let local = OperatorRegistry::new();
    let spec = OpSpec::new("ops/add").with_args(json!({ "n": 1 }));

    let out = DataCollection::from_stream(0..6)
        .config(pool_config(3, &cache))?
        .resolve(&local, &hub, &spec)?
        .successes()
        .to_vec();

    assert_collections_unordered_equal(&out, &[1, 2, 3, 4, 5, 6]);
    assert_eq!(hub_probe.setups(), 3);
    assert_eq!(hub_probe.calls(), 6);
    assert_eq!(hub_probe.teardowns(), 3);
    assert!(!cache.exists());
    Ok(())
}

#[test]
fn unknown_operator_is_an_error() {
    let local = OperatorRegistry::<i32, i32>::new();
    let hub = OperatorRegistry::<i32, i32>::new();
    let err = DataCollection::of(vec![1])
        .resolve(&local, &hub, &OpSpec::new("ops/missing"))
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DcError>(),
        Some(DcError::UnknownOperator { path }) if path == "ops/missing"
    ));
}

#[test]
fn children_inherit_configuration() -> Result<()> {
    let dc = DataCollection::range(3)
        .set_parallel(3)
        .with_cache_root("/tmp/dc-cache")
        .map(|x: &usize| x + 1)
        .filter(|x: &usize| *x > 1);
    assert_eq!(dc.num_worker(), 3);
    assert_eq!(dc.get_config().backend, Backend::Threaded);
    assert_eq!(
        dc.get_config().cache_root.as_deref(),
        Some(std::path::Path::new("/tmp/dc-cache"))
    );
    Ok(())
}

#[test]
fn filter_ok_tests_success_values_and_keeps_failures() -> Result<()> {
    let outcomes = || DataCollection::of(vec![1, 0, 2, 5]).try_map("ten_over", ten_over);

    let kept = outcomes()?.filter_ok(|x: &i32| *x > 2, false).to_vec();
    assert_eq!(kept.len(), 3);
    assert_collections_equal(&successes_of(&kept), &[10, 5]);
    assert_failed_inputs(&kept, &[0]);

    let dropped = outcomes()?.filter_ok(|x: &i32| *x > 2, true).to_vec();
    assert_collections_equal(&successes_of(&dropped), &[10, 5]);
    assert!(failures_of(&dropped).is_empty());
    Ok(())
}
