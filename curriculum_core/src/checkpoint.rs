//! Checkpoint trait and error handling for deterministic state persistence.
//!
//! Every snapshot is written with the same bincode options (fixed-width
//! integers, little endian), so serializing an unchanged value twice yields
//! identical bytes. Snapshots carry a schema version that is checked on load,
//! and are written through a temporary sibling file renamed into place, so a
//! crash mid-save leaves the previous checkpoint intact.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while saving or loading checkpoints.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Underlying I/O failure while reading or writing checkpoint files.
    #[error("I/O error while accessing checkpoint: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization or deserialization error from the binary codec.
    #[error("Failed to (de)serialize checkpoint payload: {0}")]
    Serialization(#[from] bincode::Error),
    /// The checkpoint file was well formed but produced an incompatible schema version.
    #[error("Checkpoint version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    /// The checkpoint file did not match the expected structure.
    #[error("Checkpoint file has invalid structure: {0}")]
    InvalidFormat(String),
}

/// Deterministic binary codec options shared by all checkpoint implementations.
fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_little_endian()
}

/// Encode a value with the shared codec.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CheckpointError> {
    Ok(codec().serialize(value)?)
}

/// Decode a value encoded with [`encode`].
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CheckpointError> {
    Ok(codec().deserialize(bytes)?)
}

/// Reject a snapshot whose schema version differs from `expected`.
pub fn check_version(expected: u32, found: u32) -> Result<(), CheckpointError> {
    if expected == found {
        Ok(())
    } else {
        Err(CheckpointError::VersionMismatch { expected, found })
    }
}

/// Write a serializable snapshot to `path` with the shared codec.
pub fn write_snapshot<P, T>(snapshot: &T, path: P) -> Result<(), CheckpointError>
where
    P: AsRef<Path>,
    T: Serialize,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let staging = staging_path(path);
    {
        let bytes = encode(snapshot)?;
        let file = File::create(&staging)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&staging, path)?;
    Ok(())
}

/// Read a serializable snapshot from `path` with the shared codec.
pub fn read_snapshot<P, T>(path: P) -> Result<T, CheckpointError>
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let mut bytes = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;
    decode(&bytes)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Components that support deterministic persistence implement this trait.
pub trait Checkpointable: Sized {
    /// Save the current state to `path` using the deterministic codec.
    fn save_checkpoint<P: AsRef<Path>>(&self, path: P) -> Result<(), CheckpointError>;

    /// Load a state from `path`, replacing any existing instance.
    fn load_checkpoint<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError>;
}
