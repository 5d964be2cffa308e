use anyhow::Result;
use datacollection::config::{DEFAULT_NUM_WORKER, SELF_PACKAGE};
use datacollection::*;
use std::path::Path;

#[test]
fn defaults() {
    let cfg = DcConfig::default();
    assert_eq!(cfg.num_worker, None);
    assert_eq!(cfg.effective_workers(), DEFAULT_NUM_WORKER);
    assert_eq!(cfg.backend, Backend::Local);
    assert!(!cfg.backend_started());
}

#[test]
fn loads_from_json() -> Result<()> {
    let cfg = DcConfig::from_json_str(
        r#"{
            "num_worker": 4,
            "backend": "threaded",
            "cache_root": "/var/cache/dc",
            "runtime": { "address": "ray://head:10001", "pip_packages": ["numpy"] }
        }"#,
    )?;
    assert_eq!(cfg.effective_workers(), 4);
    assert_eq!(cfg.backend, Backend::Threaded);
    assert_eq!(cfg.effective_cache_root().as_deref(), Some(Path::new("/var/cache/dc")));

    let runtime = cfg.runtime.as_ref().expect("runtime");
    assert_eq!(runtime.address.as_deref(), Some("ray://head:10001"));
    assert!(runtime.silence);
    assert!(cfg.backend_started());
    Ok(())
}

#[test]
fn json_round_trip() -> Result<()> {
    let cfg = DcConfig {
        num_worker: Some(3),
        backend: Backend::Pool,
        cache_root: None,
        runtime: Some(RuntimeEnv::new(None)),
    };
    assert_eq!(DcConfig::from_json_str(&cfg.to_json()?)?, cfg);
    Ok(())
}

#[test]
fn zero_workers_is_rejected() {
    let err = DcConfig::from_json_str(r#"{ "num_worker": 0 }"#).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DcError>(),
        Some(DcError::InvalidConfig(_))
    ));

    let bad = DcConfig {
        num_worker: Some(0),
        ..DcConfig::default()
    };
    assert!(DataCollection::range(1).config(bad).is_err());
}

#[test]
fn malformed_json_is_an_error() {
    assert!(DcConfig::from_json_str("{ num_worker: ").is_err());
    assert!(DcConfig::from_json_str(r#"{ "backend": "gpu" }"#).is_err());
}

#[test]
fn loads_from_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("dc.json");
    std::fs::write(&path, r#"{ "num_worker": 6 }"#)?;
    assert_eq!(DcConfig::from_json_file(&path)?.effective_workers(), 6);
    assert!(DcConfig::from_json_file(dir.path().join("missing.json")).is_err());
    Ok(())
}

#[test]
fn remote_runtime_ships_this_package() {
    let env = RuntimeEnv::new(Some("ray://head:10001".to_string()))
        .with_pip_packages(["numpy"])
        .normalized();
    assert_eq!(env.pip_packages, vec!["numpy".to_string(), SELF_PACKAGE.to_string()]);

    let listed = RuntimeEnv::new(Some("ray://head:10001".to_string()))
        .with_local_packages([SELF_PACKAGE])
        .normalized();
    assert!(listed.pip_packages.is_empty());

    let in_process = RuntimeEnv::new(None).normalized();
    assert!(in_process.pip_packages.is_empty());
}

#[test]
fn start_backend_switches_to_the_pool() {
    let dc = DataCollection::range(3).start_backend(RuntimeEnv::new(Some("ray://head".into())));
    let cfg = dc.get_config();
    assert_eq!(cfg.backend, Backend::Pool);
    assert!(cfg.backend_started());
    let runtime = cfg.runtime.as_ref().expect("runtime");
    assert!(runtime.pip_packages.iter().any(|p| p == SELF_PACKAGE));
}
