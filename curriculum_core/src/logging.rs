//! JSON line-delimited metric streams.
//!
//! The confusion-matrix stream written by `SpecialistRegistry::save_stg` is an
//! append-only journal: each line is one [`ConfusionRow`]. A restarted run
//! may append a generation again; readers keep the last row per
//! `(specialist, generation)`.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::confusion::ConfusionRow;

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

pub fn append_json_line<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> io::Result<()> {
    append_json_lines(path, std::slice::from_ref(value))
}

/// Append several values, one JSON document per line, with a single open.
pub fn append_json_lines<P: AsRef<Path>, T: Serialize>(path: P, values: &[T]) -> io::Result<()> {
    if values.is_empty() {
        return Ok(());
    }
    ensure_parent(path.as_ref())?;
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);
    for value in values {
        serde_json::to_writer(&mut writer, value)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

#[derive(Debug, Error)]
pub enum JsonLinesError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A line is not a valid document. `line` is 1-based.
    #[error("line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Read every non-blank line of a JSONL file.
pub fn read_json_lines<P: AsRef<Path>, T: DeserializeOwned>(
    path: P,
) -> Result<Vec<T>, JsonLinesError> {
    let reader = BufReader::new(File::open(path)?);
    let mut values = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str(&line).map_err(|source| JsonLinesError::Malformed {
            line: index + 1,
            source,
        })?;
        values.push(value);
    }
    Ok(values)
}

/// Read the confusion stream, keeping the last row per specialist and
/// generation. Rows come back ordered by specialist name, then generation.
pub fn read_confusion_stream<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<ConfusionRow>, JsonLinesError> {
    let rows: Vec<ConfusionRow> = read_json_lines(path)?;
    let mut latest: BTreeMap<(String, u64), ConfusionRow> = BTreeMap::new();
    for row in rows {
        latest.insert((row.specialist.clone(), row.outcome.generation), row);
    }
    Ok(latest.into_values().collect())
}
