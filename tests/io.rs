use anyhow::Result;
use datacollection::testing::*;
use datacollection::*;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
struct Event {
    id: u32,
    kind: String,
}

#[test]
fn from_glob_lists_matching_files_sorted() -> Result<()> {
    let dir = tempfile::tempdir()?;
    for name in ["b.jsonl", "a.jsonl", "c.txt"] {
        fs::write(dir.path().join(name), "")?;
    }
    fs::create_dir(dir.path().join("d.jsonl"))?;

    let pattern = format!("{}/*.jsonl", dir.path().display());
    let files = DataCollection::from_glob(&[pattern])?.to_vec();
    let names: Vec<_> = files
        .iter()
        .filter_map(|p| p.file_name()?.to_str().map(str::to_string))
        .collect();
    assert_collections_equal(&names, &["a.jsonl".to_string(), "b.jsonl".to_string()]);
    Ok(())
}

#[test]
fn from_glob_without_matches_fails() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pattern = format!("{}/*.parquet", dir.path().display());
    let err = DataCollection::from_glob(&[pattern]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DcError>(),
        Some(DcError::NoMatchingFiles(_))
    ));
    Ok(())
}

#[test]
fn jsonl_round_trip_through_a_collection() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("out").join("events.jsonl");
    let events = vec![
        Event { id: 1, kind: "click".into() },
        Event { id: 2, kind: "view".into() },
    ];

    let written = DataCollection::of(events.clone()).to_jsonl(&path)?;
    assert_eq!(written, 2);

    let read = read_jsonl::<Event>(&path)?.successes().to_vec();
    assert_collections_equal(&read, &events);
    Ok(())
}

#[test]
fn malformed_lines_become_failures() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("events.jsonl");
    fs::write(
        &path,
        "{\"id\":1,\"kind\":\"a\"}\n\n{not json}\n{\"id\":3,\"kind\":\"c\"}\n",
    )?;

    let dc = read_jsonl::<Event>(&path)?;
    assert!(dc.is_stream());
    let out = dc.to_vec();
    assert_eq!(out.len(), 3);
    assert_eq!(successes_of(&out).iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 3]);

    let failures = assert_failed_inputs(&out, &["{not json}".to_string()]);
    assert_eq!(failures[0].op(), "read_jsonl");
    Ok(())
}

#[test]
fn missing_jsonl_file_fails_on_open() {
    assert!(read_jsonl::<Event>("/definitely/not/here.jsonl").is_err());
}
