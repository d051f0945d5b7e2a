//! The model interface the harness drives, and name-based persistence of
//! burn module records.

mod record;

use burn::prelude::*;

use crate::coref::CorefPrediction;
use crate::error::ModelError;

pub use record::{export_record, parameter_paths, restore_record, RestoreReport};

/// A coreference scorer built as a burn [`Module`].
///
/// Training runs the module on an autodiff backend; evaluation runs
/// `module.valid()`, the same model on the inner backend with gradient
/// tracking and stochastic regularization off. Implement this generically
/// over `B: Backend` so both halves are covered.
pub trait CorefModel<B: Backend>: Module<B> {
    /// One example's worth of model input.
    type Input;

    /// Forward pass producing the scalar training loss (a one-element tensor).
    fn loss(&self, input: &Self::Input) -> Result<Tensor<B, 1>, ModelError>;

    fn predict(&self, input: &Self::Input) -> Result<CorefPrediction, ModelError>;
}
