//! Training infrastructure: the epoch loop, the evaluation pass it
//! interleaves, and running statistics for progress logs.

pub mod evaluation;
pub mod metrics;
pub mod trainer;

pub use evaluation::Evaluator;
pub use metrics::{EpochStats, LogCadence};
pub use trainer::{Collaborators, EpochSummary, ResumeConfig, Trainer, TrainerConfig};
