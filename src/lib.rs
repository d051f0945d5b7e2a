//! # Coref Runner
//!
//! Checkpointed training and evaluation harness for span-ranking coreference
//! models. The model math, batch generation and scoring live behind traits;
//! this crate drives epochs, interleaves validation, and persists resumable
//! run state together with a best-score watermark shared by every run that
//! writes into the same checkpoint directory.
//!
//! A run is driven from library code: implement [`model::CorefModel`] for a
//! burn module, provide the [`training::Collaborators`], and call
//! [`training::Trainer::train`] or [`training::Trainer::test`]. The bundled
//! binary only inspects checkpoints and the watermark.
//!
//! ## Modules
//!
//! - [`training`]: Epoch loop, evaluation pass, progress statistics
//! - [`checkpoint`]: Checkpoint ids, run state files, best-score watermark
//! - [`optim`]: Clipped burn Adam, step-decay schedule, optimization step
//! - [`model`]: The `CorefModel` interface and name-based record restore
//! - [`data`]: Batch sources, gold labels, prediction sinks
//! - [`coref`]: Spans, clusters and prediction records
//! - [`config`]: TOML configuration loading and validation
//! - [`error`]: Structured error types

pub mod checkpoint;
pub mod config;
pub mod coref;
pub mod data;
pub mod error;
pub mod model;
pub mod optim;
pub mod training;

#[cfg(test)]
mod testing;
