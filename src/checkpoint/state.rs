use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::optim::StepLrState;

/// Everything needed to resume a run, as written to a `.ckpt` file.
///
/// `model` and `optimizer` hold burn record items (full precision) rendered
/// as JSON. Model entries are keyed by module field path so they can be
/// restored by name into a model whose layout has since changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Epoch during which the snapshot was taken. Resuming continues at the
    /// next epoch.
    pub epoch_idx: usize,
    #[serde(alias = "max_f1")]
    pub max_score_seen: f64,
    pub seed: u64,
    pub model: Value,
    pub optimizer: Value,
    pub lr_scheduler: StepLrState,
}

impl RunState {
    /// First epoch a run restored from this state should execute.
    pub fn resume_epoch(&self) -> usize {
        self.epoch_idx + 1
    }
}
