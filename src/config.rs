use std::path::Path;

use tracing::warn;

use crate::checkpoint::{CheckpointConfig, CheckpointId};
use crate::error::ConfigError;
use crate::optim::OptimizerConfig;
use crate::training::{ResumeConfig, TrainerConfig};

/// Smallest accepted logging step, in percent of an epoch. Finer steps
/// would fire an evaluation pass per handful of batches.
pub const MIN_LOG_STEP_PCT: f64 = 0.1;

/// Top-level run configuration, loadable from TOML.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub optimizer: OptimizerConfig,
    pub training: TrainerConfig,
    pub checkpoint: CheckpointConfig,
    pub resume: ResumeConfig,
}

impl RunnerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: RunnerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            warn!("config file '{}' not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let opt = &self.optimizer;
        if !(opt.initial_lr > 0.0) {
            return Err(ConfigError::Validation(
                "optimizer.initial_lr must be > 0".into(),
            ));
        }
        if opt.lr_decay_freq == 0 {
            return Err(ConfigError::Validation(
                "optimizer.lr_decay_freq must be > 0".into(),
            ));
        }
        if !(opt.lr_decay_rate > 0.0 && opt.lr_decay_rate <= 1.0) {
            return Err(ConfigError::Validation(
                "optimizer.lr_decay_rate must be in (0, 1]".into(),
            ));
        }
        if !(opt.max_grad_norm > 0.0) {
            return Err(ConfigError::Validation(
                "optimizer.max_grad_norm must be > 0".into(),
            ));
        }

        let training = &self.training;
        if training.epoch_num == 0 {
            return Err(ConfigError::Validation(
                "training.epoch_num must be > 0".into(),
            ));
        }
        if !(training.log_step_pct >= MIN_LOG_STEP_PCT)
            || !(training.eval_log_step_pct >= MIN_LOG_STEP_PCT)
        {
            return Err(ConfigError::Validation(format!(
                "training.log_step_pct and training.eval_log_step_pct must be >= {MIN_LOG_STEP_PCT}"
            )));
        }
        if training.log_start_pct < 0.0 || training.eval_log_start_pct < 0.0 {
            return Err(ConfigError::Validation(
                "training.log_start_pct and training.eval_log_start_pct must be >= 0".into(),
            ));
        }

        if let Some(timestamp) = &self.checkpoint.timestamp {
            CheckpointId::new(timestamp, 0).map_err(|_| {
                ConfigError::Validation(format!(
                    "checkpoint.timestamp '{timestamp}' must look like <date>-<time>"
                ))
            })?;
        }
        if let Some(id) = &self.resume.ckpt_id {
            id.parse::<CheckpointId>()
                .map_err(|e| ConfigError::Validation(format!("resume.ckpt_id: {e}")))?;
        }

        Ok(())
    }

    /// Generate a TOML string with all default values (useful for creating
    /// example config files).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&RunnerConfig::default()).unwrap_or_default()
    }
}
