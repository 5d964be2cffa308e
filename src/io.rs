//! File sources and sinks.
//!
//! - [`expand_glob`]: sorted file list for a set of glob patterns
//! - [`read_jsonl`]: lazy JSON Lines reader, one [`Outcome`] per non-empty line
//! - [`write_jsonl`]: JSON Lines writer
//!
//! A malformed line does not abort the read. It becomes a [`Failure`](crate::Failure)
//! holding the raw line, like any other per-element failure.

use crate::collection::{DataCollection, Element};
use crate::error::DcError;
use crate::outcome::Outcome;
use crate::task::fail;
use anyhow::{Context, Result, anyhow};
use serde::{Serialize, de::DeserializeOwned};
use std::fs::{File, create_dir_all};
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::iter::Enumerate;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Expand glob patterns into the files they match.
///
/// Each pattern's matches are sorted; patterns keep their given order.
/// Directories are skipped.
///
/// # Errors
/// An invalid pattern, an unreadable entry, or [`DcError::NoMatchingFiles`]
/// when nothing matches at all.
pub fn expand_glob<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let mut matched = Vec::new();
        let entries =
            glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;
        for entry in entries {
            let path = entry.with_context(|| format!("read glob entry for {pattern}"))?;
            if path.is_file() {
                matched.push(path);
            }
        }
        matched.sort();
        files.extend(matched);
    }
    if files.is_empty() {
        let all: Vec<&str> = patterns.iter().map(AsRef::as_ref).collect();
        return Err(DcError::NoMatchingFiles(all.join(", ")).into());
    }
    Ok(files)
}

/// Stream a JSON Lines file as a collection of parsed records.
///
/// Blank lines are skipped. A line that fails to parse yields a failure whose
/// input is the raw line; a read error ends the stream after yielding one
/// failure naming the line number.
///
/// # Errors
/// If the file cannot be opened.
pub fn read_jsonl<T>(path: impl AsRef<Path>) -> Result<DataCollection<Outcome<T>>>
where
    T: DeserializeOwned + Element,
{
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    Ok(DataCollection::from_stream(JsonlRecords::<T> {
        path: path.display().to_string(),
        lines: BufReader::new(f).lines().enumerate(),
        done: false,
        _t: PhantomData,
    }))
}

struct JsonlRecords<T> {
    path: String,
    lines: Enumerate<Lines<BufReader<File>>>,
    done: bool,
    _t: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Iterator for JsonlRecords<T> {
    type Item = Outcome<T>;

    fn next(&mut self) -> Option<Outcome<T>> {
        if self.done {
            return None;
        }
        for (i, line) in self.lines.by_ref() {
            let lineno = i + 1;
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    self.done = true;
                    let cause = anyhow!(e).context(format!("read line {lineno}"));
                    return Some(fail("read_jsonl", format!("{}:{lineno}", self.path), cause));
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(match serde_json::from_str(&line) {
                Ok(v) => Outcome::Success(v),
                Err(e) => {
                    let cause = anyhow!(e).context(format!("parse line {lineno} in {}", self.path));
                    fail("read_jsonl", line, cause)
                }
            });
        }
        self.done = true;
        None
    }
}

/// Write records as JSON Lines, creating parent directories as needed.
///
/// # Returns
/// The number of records written.
///
/// # Errors
/// If the file cannot be created or a record fails to serialize.
pub fn write_jsonl<T, I>(path: impl AsRef<Path>, records: I) -> Result<usize>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(f);
    let mut n = 0;
    for record in records {
        serde_json::to_writer(&mut w, &record)
            .with_context(|| format!("serialize record {n} to {}", path.display()))?;
        w.write_all(b"\n")?;
        n += 1;
    }
    w.flush().with_context(|| format!("flush {}", path.display()))?;
    Ok(n)
}
