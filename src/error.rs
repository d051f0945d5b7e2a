use std::path::PathBuf;

/// Errors raised by a model or data collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("forward pass failed: {0}")]
    Forward(String),

    #[error("gradient computation failed: {0}")]
    Backward(String),

    #[error("prediction failed: {0}")]
    Predict(String),

    #[error("missing gold clusters for {split}/{example_id}")]
    MissingGold { split: String, example_id: String },
}

/// Errors that can occur during checkpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("no checkpoint found: {0}")]
    NotFound(String),

    #[error("invalid checkpoint id '{0}' (expected <date>-<time>.<epoch>)")]
    InvalidId(String),

    #[error("failed to read checkpoint {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse checkpoint {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("watermark file {path} does not hold a score: {content:?}")]
    Watermark { path: PathBuf, content: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur during training or evaluation.
#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("non-finite {quantity} ({value}) at epoch {epoch}, batch {batch}")]
    NumericFailure {
        quantity: &'static str,
        value: f64,
        epoch: usize,
        batch: usize,
    },

    #[error("split '{0}' produced no batches")]
    EmptySplit(String),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}
