use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;

use crate::error::{ModelError, TrainingError};
use crate::model::CorefModel;
use crate::optim::{ModelOptimizer, StepLr};

/// What one optimization step observed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub loss: f64,
    /// Learning rate the update was applied with.
    pub learning_rate: f64,
}

/// Why a step could not be applied. Both variants are fatal for the run.
#[derive(Debug)]
pub enum StepFailure {
    NonFinite { quantity: &'static str, value: f64 },
    Model(ModelError),
}

impl From<ModelError> for StepFailure {
    fn from(err: ModelError) -> Self {
        StepFailure::Model(err)
    }
}

impl StepFailure {
    /// Attach the position in the run at which the step failed.
    pub fn at(self, epoch: usize, batch: usize) -> TrainingError {
        match self {
            StepFailure::NonFinite { quantity, value } => TrainingError::NumericFailure {
                quantity,
                value,
                epoch,
                batch,
            },
            StepFailure::Model(err) => TrainingError::Model(err),
        }
    }
}

/// One gradient-descent update: loss, backward, schedule step, then a
/// clipped Adam step. Returns the updated model; on failure nothing was
/// applied and the caller's copy is still current.
///
/// Gradients come fresh from each backward pass, so no accumulation carries
/// over between steps.
pub fn optimization_step<B, M>(
    model: M,
    optimizer: &mut ModelOptimizer<M, B>,
    scheduler: &mut StepLr,
    input: &M::Input,
) -> Result<(M, StepOutcome), StepFailure>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + CorefModel<B>,
{
    let loss = model.loss(input)?;
    let value: f64 = loss.clone().into_scalar().elem();
    if !value.is_finite() {
        return Err(StepFailure::NonFinite {
            quantity: "loss",
            value,
        });
    }

    let grads = GradientsParams::from_grads(loss.backward(), &model);

    scheduler.step();
    let learning_rate = scheduler.learning_rate();
    let model = optimizer.step(learning_rate, model, grads);

    Ok((
        model,
        StepOutcome {
            loss: value,
            learning_rate,
        },
    ))
}
