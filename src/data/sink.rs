use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::coref::PredictionRecord;
use crate::data::{PredictionSink, Split};

/// Writes predictions as JSON lines to `<dir>/<split>.predictions.jsonl`,
/// replacing any previous file for that split.
#[derive(Debug, Clone)]
pub struct JsonlPredictionSink {
    dir: PathBuf,
}

impl JsonlPredictionSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        JsonlPredictionSink { dir: dir.into() }
    }

    pub fn path_for(&self, split: Split) -> PathBuf {
        self.dir.join(format!("{split}.predictions.jsonl"))
    }

    fn write(&self, path: &Path, predictions: &[PredictionRecord]) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut out = BufWriter::new(File::create(path)?);
        for record in predictions {
            serde_json::to_writer(&mut out, record)?;
            out.write_all(b"\n")?;
        }
        out.flush()
    }
}

impl PredictionSink for JsonlPredictionSink {
    fn save(&mut self, split: Split, predictions: &[PredictionRecord]) {
        let path = self.path_for(split);
        match self.write(&path, predictions) {
            Ok(()) => info!(
                "saved {} predictions to {}",
                predictions.len(),
                path.display()
            ),
            Err(e) => warn!("failed to save predictions to {}: {e}", path.display()),
        }
    }
}
