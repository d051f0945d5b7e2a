//! Data-facing collaborators: batch generation per split, gold labels, and
//! the sink that persists predictions.

mod sink;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::coref::{Cluster, PredictionRecord};
use crate::error::ModelError;

pub use sink::JsonlPredictionSink;

/// Named partition of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Valid,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Valid => "valid",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One example as yielded by a [`BatchSource`].
#[derive(Debug, Clone)]
pub struct Batch<I> {
    /// Percentage of the split consumed once this batch is processed, in
    /// `[0, 100]` and non-decreasing within one traversal.
    pub progress_pct: f64,
    pub example_id: String,
    pub input: I,
}

impl<I> Batch<I> {
    pub fn new(progress_pct: f64, example_id: impl Into<String>, input: I) -> Self {
        Batch {
            progress_pct,
            example_id: example_id.into(),
            input,
        }
    }
}

/// A lazy traversal of one split.
pub type Batches<I> = Box<dyn Iterator<Item = Result<Batch<I>, ModelError>>>;

/// Produces a fresh, finite traversal of a split on every call.
pub trait BatchSource {
    type Input;

    fn generate(&self, split: Split) -> Result<Batches<Self::Input>, ModelError>;
}

/// Gold clusters for an evaluated example.
pub trait GoldLabelSource {
    fn gold_clusters(&self, split: Split, example_id: &str) -> Result<Vec<Cluster>, ModelError>;
}

/// Persists raw predictions. Fire-and-forget: failures are the sink's to
/// report.
pub trait PredictionSink {
    fn save(&mut self, split: Split, predictions: &[PredictionRecord]);
}
