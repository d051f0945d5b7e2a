//! Optimizer construction and persistence, the learning-rate schedule, and
//! the single optimization step that ties them to a
//! [`CorefModel`](crate::model::CorefModel).

mod scheduler;
mod step;

use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, Optimizer};
use burn::record::{FullPrecisionSettings, Record};
use burn::tensor::backend::AutodiffBackend;
use serde_json::Value;

use crate::error::CheckpointError;

pub use scheduler::{StepLr, StepLrState};
pub use step::{optimization_step, StepFailure, StepOutcome};

/// Adam over the parameters of `M`, with global-norm gradient clipping.
pub type ModelOptimizer<M, B> = OptimizerAdaptor<Adam, M, B>;

type OptimizerRecord<M, B> = <ModelOptimizer<M, B> as Optimizer<M, B>>::Record;

/// Optimizer hyperparameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub initial_lr: f64,
    /// Number of optimizer steps between learning-rate decays.
    pub lr_decay_freq: usize,
    pub lr_decay_rate: f64,
    pub max_grad_norm: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            initial_lr: 1e-3,
            lr_decay_freq: 100,
            lr_decay_rate: 0.999,
            max_grad_norm: 5.0,
        }
    }
}

impl OptimizerConfig {
    /// Fresh Adam with no moment estimates. The learning rate is supplied per
    /// step by the schedule.
    pub fn build_optimizer<B, M>(&self) -> ModelOptimizer<M, B>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
    {
        AdamConfig::new()
            .with_grad_clipping(Some(GradientClippingConfig::Norm(self.max_grad_norm as f32)))
            .init()
    }

    pub fn build_scheduler(&self) -> StepLr {
        StepLr::new(self.initial_lr, self.lr_decay_freq, self.lr_decay_rate)
    }
}

/// Per-parameter Adam state as JSON, keyed by parameter id.
pub fn export_optimizer<B, M>(optimizer: &ModelOptimizer<M, B>) -> Result<Value, CheckpointError>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let item = optimizer.to_record().into_item::<FullPrecisionSettings>();
    Ok(serde_json::to_value(item)?)
}

/// Load exported Adam state into `optimizer`. Entries for parameter ids the
/// model no longer has are carried but never read.
pub fn restore_optimizer<B, M>(
    optimizer: ModelOptimizer<M, B>,
    saved: Value,
    device: &B::Device,
) -> Result<ModelOptimizer<M, B>, CheckpointError>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let item: <OptimizerRecord<M, B> as Record<B>>::Item<FullPrecisionSettings> =
        serde_json::from_value(saved)?;
    let record =
        <OptimizerRecord<M, B> as Record<B>>::from_item::<FullPrecisionSettings>(item, device);
    Ok(optimizer.load_record(record))
}
