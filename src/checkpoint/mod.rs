mod id;
mod manager;
mod state;
mod watermark;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::CheckpointError;

pub use id::{CheckpointId, CHECKPOINT_EXTENSION};
pub use manager::{CheckpointConfig, CheckpointManager, CheckpointSelector, LoadedCheckpoint};
pub use state::RunState;
pub use watermark::Watermark;

/// Write `bytes` to a sibling temp file, sync it, then rename it over `path`
/// so readers never observe a partial file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CheckpointError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{file_name}.tmp"));

    let mut file = File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp, path)?;
    Ok(())
}
