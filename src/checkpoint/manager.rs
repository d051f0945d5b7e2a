use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info};

use crate::checkpoint::id::{CheckpointId, CHECKPOINT_EXTENSION};
use crate::checkpoint::state::RunState;
use crate::checkpoint::watermark::Watermark;
use crate::checkpoint::write_atomic;
use crate::error::CheckpointError;

/// Where checkpoints and the best-score watermark live.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub ckpts_dir: PathBuf,
    /// Watermark file. Defaults to `<ckpts_dir>/max_f1.txt`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_f1_path: Option<PathBuf>,
    /// Copy of the best checkpoint. Defaults to `<ckpts_dir>/best.ckpt`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_ckpt_path: Option<PathBuf>,
    /// Run timestamp (`<date>-<time>`) used in checkpoint names. Defaults to
    /// the process start time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        CheckpointConfig {
            ckpts_dir: PathBuf::from("checkpoints"),
            max_f1_path: None,
            best_ckpt_path: None,
            timestamp: None,
        }
    }
}

impl CheckpointConfig {
    pub fn max_f1_path(&self) -> PathBuf {
        self.max_f1_path
            .clone()
            .unwrap_or_else(|| self.ckpts_dir.join("max_f1.txt"))
    }

    pub fn best_ckpt_path(&self) -> PathBuf {
        self.best_ckpt_path
            .clone()
            .unwrap_or_else(|| self.ckpts_dir.join(format!("best.{CHECKPOINT_EXTENSION}")))
    }
}

/// Which checkpoint to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointSelector {
    Id(CheckpointId),
    /// The copy kept at the best-checkpoint path.
    Best,
    /// Greatest `(date, time, epoch_idx)` in the checkpoint directory.
    Latest,
}

impl std::str::FromStr for CheckpointSelector {
    type Err = CheckpointError;

    /// `best`, `latest`, or a checkpoint id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best" => Ok(CheckpointSelector::Best),
            "latest" => Ok(CheckpointSelector::Latest),
            id => Ok(CheckpointSelector::Id(id.parse()?)),
        }
    }
}

/// A checkpoint read back from disk.
#[derive(Debug)]
pub struct LoadedCheckpoint {
    pub path: PathBuf,
    pub state: RunState,
}

/// Saves, lists and loads checkpoints, and owns the best-score watermark.
pub struct CheckpointManager {
    ckpts_dir: PathBuf,
    best_path: PathBuf,
    timestamp: String,
    watermark: Watermark,
    watermark_lock: Mutex<()>,
}

impl CheckpointManager {
    pub fn new(config: &CheckpointConfig) -> Self {
        let timestamp = config
            .timestamp
            .clone()
            .unwrap_or_else(|| chrono::Local::now().format("%Y%m%d-%H%M%S").to_string());
        CheckpointManager {
            ckpts_dir: config.ckpts_dir.clone(),
            best_path: config.best_ckpt_path(),
            timestamp,
            watermark: Watermark::new(config.max_f1_path()),
            watermark_lock: Mutex::new(()),
        }
    }

    pub fn ckpts_dir(&self) -> &Path {
        &self.ckpts_dir
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn watermark(&self) -> &Watermark {
        &self.watermark
    }

    pub fn best_path(&self) -> &Path {
        &self.best_path
    }

    pub fn path_for(&self, id: &CheckpointId) -> PathBuf {
        self.ckpts_dir.join(id.file_name())
    }

    /// Persist `state` as `<timestamp>.<epoch_idx>.ckpt` and refresh the best
    /// checkpoint copy. Both files are replaced atomically.
    pub fn save(&self, state: &RunState) -> Result<CheckpointId, CheckpointError> {
        let id = CheckpointId::new(&self.timestamp, state.epoch_idx)?;
        let path = self.path_for(&id);
        info!("saving checkpoint {}", path.display());

        let bytes = serde_json::to_vec(state)?;
        write_atomic(&path, &bytes)?;
        write_atomic(&self.best_path, &bytes)?;
        Ok(id)
    }

    /// All checkpoints in the directory, oldest first. Files that are not
    /// named like checkpoints are ignored.
    pub fn list(&self) -> Result<Vec<CheckpointId>, CheckpointError> {
        if !self.ckpts_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.ckpts_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.ends_with(CHECKPOINT_EXTENSION) {
                continue;
            }
            match CheckpointId::from_file_name(&name) {
                Ok(id) => ids.push(id),
                Err(_) => debug!("ignoring {name} in {}", self.ckpts_dir.display()),
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn latest(&self) -> Result<CheckpointId, CheckpointError> {
        self.list()?.into_iter().max().ok_or_else(|| {
            CheckpointError::NotFound(format!("no checkpoints in {}", self.ckpts_dir.display()))
        })
    }

    pub fn resolve(&self, selector: &CheckpointSelector) -> Result<PathBuf, CheckpointError> {
        let path = match selector {
            CheckpointSelector::Id(id) => self.path_for(id),
            CheckpointSelector::Best => self.best_path.clone(),
            CheckpointSelector::Latest => self.path_for(&self.latest()?),
        };
        if !path.is_file() {
            return Err(CheckpointError::NotFound(path.display().to_string()));
        }
        Ok(path)
    }

    pub fn load(&self, selector: &CheckpointSelector) -> Result<LoadedCheckpoint, CheckpointError> {
        let path = self.resolve(selector)?;
        info!("loading checkpoint {}", path.display());

        let bytes = fs::read(&path).map_err(|e| CheckpointError::Read {
            path: path.clone(),
            source: e,
        })?;
        let state: RunState =
            serde_json::from_slice(&bytes).map_err(|e| CheckpointError::Parse {
                path: path.clone(),
                source: e,
            })?;
        Ok(LoadedCheckpoint { path, state })
    }

    /// Raise the watermark to `candidate` if it beats the value on disk.
    ///
    /// Returns `true` when the watermark was raised, in which case the caller
    /// should persist a checkpoint. The read-compare-write runs under an
    /// in-process lock only; other processes sharing the file are not
    /// excluded.
    pub fn check_and_update_watermark(&self, candidate: f64) -> Result<bool, CheckpointError> {
        let _guard = self
            .watermark_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let improved = match self.watermark.read()? {
            Some(best) => candidate > best,
            None => !candidate.is_nan(),
        };
        if improved {
            self.watermark.write(candidate)?;
            info!("new best score {candidate} recorded in {}", self.watermark.path().display());
        } else {
            debug!("score {candidate} does not beat the recorded best");
        }
        Ok(improved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::optim::StepLr;

    fn manager(dir: &Path, timestamp: &str) -> CheckpointManager {
        CheckpointManager::new(&CheckpointConfig {
            ckpts_dir: dir.to_path_buf(),
            timestamp: Some(timestamp.to_string()),
            ..Default::default()
        })
    }

    fn run_state(epoch_idx: usize, score: f64) -> RunState {
        RunState {
            epoch_idx,
            max_score_seen: score,
            seed: 11,
            model: json!({"bias": {"id": "p0", "param": {"shape": [1], "value": [0.5]}}}),
            optimizer: json!({}),
            lr_scheduler: StepLr::new(1e-3, 10, 0.5).state().clone(),
        }
    }

    #[test]
    fn test_selector_from_str() {
        assert_eq!("best".parse::<CheckpointSelector>().unwrap(), CheckpointSelector::Best);
        assert_eq!("latest".parse::<CheckpointSelector>().unwrap(), CheckpointSelector::Latest);
        let id = "20240101-093000.4".parse::<CheckpointSelector>().unwrap();
        assert!(matches!(id, CheckpointSelector::Id(id) if id.epoch_idx() == 4));
        assert!("newest".parse::<CheckpointSelector>().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), "20240101-120000");
        let state = run_state(3, 0.42);

        let id = manager.save(&state).unwrap();
        assert_eq!(id.to_string(), "20240101-120000.3");
        assert!(dir.path().join("20240101-120000.3.ckpt").is_file());
        assert!(!dir.path().join("20240101-120000.3.ckpt.tmp").exists());

        let loaded = manager.load(&CheckpointSelector::Id(id)).unwrap();
        assert_eq!(loaded.state, state);
    }

    #[test]
    fn test_save_refreshes_best_copy() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), "2024-0100");
        manager.save(&run_state(1, 0.3)).unwrap();
        manager.save(&run_state(2, 0.5)).unwrap();

        let best = manager.load(&CheckpointSelector::Best).unwrap();
        assert_eq!(best.state.epoch_idx, 2);
        assert_eq!(best.path, dir.path().join("best.ckpt"));
    }

    #[test]
    fn test_latest_orders_by_date_time_then_epoch() {
        let dir = tempfile::tempdir().unwrap();
        for (timestamp, epoch) in [("2024-0100", 3), ("2024-0200", 1), ("2023-0900", 9)] {
            manager(dir.path(), timestamp).save(&run_state(epoch, 0.1)).unwrap();
        }
        let manager = manager(dir.path(), "2025-0000");

        let ids: Vec<String> = manager.list().unwrap().iter().map(|id| id.file_name()).collect();
        assert_eq!(
            ids,
            vec!["2023-0900.9.ckpt", "2024-0100.3.ckpt", "2024-0200.1.ckpt"]
        );

        let latest = manager.latest().unwrap();
        assert_eq!(latest.file_name(), "2024-0200.1.ckpt");
        let loaded = manager.load(&CheckpointSelector::Latest).unwrap();
        assert_eq!(loaded.state.epoch_idx, 1);
    }

    #[test]
    fn test_list_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), "2024-0100");
        manager.save(&run_state(0, 0.1)).unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::write(dir.path().join("2024-0100.7.ckpt.tmp"), "partial").unwrap();
        fs::create_dir(dir.path().join("2024-0300.1.ckpt")).unwrap();

        let ids = manager.list().unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].epoch_idx(), 0);
    }

    #[test]
    fn test_not_found_cases() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir.path().join("missing"), "2024-0100");

        for selector in [
            CheckpointSelector::Latest,
            CheckpointSelector::Best,
            CheckpointSelector::Id("2024-0100.0".parse().unwrap()),
        ] {
            let err = manager.load(&selector).unwrap_err();
            assert!(
                matches!(err, CheckpointError::NotFound(_)),
                "expected NotFound for {selector:?}, got: {err}"
            );
        }
    }

    #[test]
    fn test_corrupt_checkpoint_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), "2024-0100");
        fs::write(dir.path().join("2024-0100.0.ckpt"), "{ not json").unwrap();
        let err = manager.load(&CheckpointSelector::Latest).unwrap_err();
        assert!(matches!(err, CheckpointError::Parse { .. }), "got: {err}");
    }

    #[test]
    fn test_watermark_only_moves_on_strict_improvement() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), "2024-0100");
        let mark = manager.watermark().path().to_path_buf();

        assert!(manager.check_and_update_watermark(0.4).unwrap());
        assert_eq!(fs::read_to_string(&mark).unwrap().trim(), "0.4");

        assert!(!manager.check_and_update_watermark(0.4).unwrap());
        assert!(!manager.check_and_update_watermark(0.35).unwrap());
        assert!(!manager.check_and_update_watermark(f64::NAN).unwrap());
        assert_eq!(manager.watermark().read().unwrap(), Some(0.4));

        assert!(manager.check_and_update_watermark(0.41).unwrap());
        assert_eq!(manager.watermark().read().unwrap(), Some(0.41));
    }

    #[test]
    fn test_watermark_from_another_run_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), "2024-0100");
        fs::write(manager.watermark().path(), "0.9\n").unwrap();

        assert!(!manager.check_and_update_watermark(0.8).unwrap());
        assert_eq!(fs::read_to_string(manager.watermark().path()).unwrap(), "0.9\n");
    }

    #[test]
    fn test_concurrent_updates_in_one_process_keep_the_maximum() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(manager(dir.path(), "2024-0100"));

        let handles: Vec<_> = (1..=16)
            .map(|i| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || manager.check_and_update_watermark(i as f64 / 100.0))
            })
            .collect();
        let raised = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .filter(|&raised| raised)
            .count();

        assert!(raised >= 1);
        assert_eq!(manager.watermark().read().unwrap(), Some(0.16));
    }
}
