use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::checkpoint::write_atomic;
use crate::error::CheckpointError;

/// The best score ever confirmed for a checkpoint directory, stored as a
/// single floating-point literal on the first line of a text file.
///
/// Several runs may point at the same file. Reads and writes are not locked
/// across processes: with concurrent writers the last one wins.
#[derive(Debug, Clone)]
pub struct Watermark {
    path: PathBuf,
}

impl Watermark {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Watermark { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current value, or `None` when no score has been recorded yet (missing
    /// or blank file).
    pub fn read(&self) -> Result<Option<f64>, CheckpointError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CheckpointError::Read {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };
        let first = content.lines().next().unwrap_or("").trim();
        if first.is_empty() {
            return Ok(None);
        }
        first
            .parse::<f64>()
            .map(Some)
            .map_err(|_| CheckpointError::Watermark {
                path: self.path.clone(),
                content: first.to_string(),
            })
    }

    /// Replace the file's content with `score`.
    pub fn write(&self, score: f64) -> Result<(), CheckpointError> {
        write_atomic(&self.path, format!("{score}\n").as_bytes())
    }
}
