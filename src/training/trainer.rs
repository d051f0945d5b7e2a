use std::path::PathBuf;
use std::time::Duration;

use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use tracing::{debug, info, warn};

use crate::checkpoint::{CheckpointId, CheckpointManager, CheckpointSelector, RunState};
use crate::config::RunnerConfig;
use crate::data::{BatchSource, GoldLabelSource, PredictionSink, Split};
use crate::error::{CheckpointError, TrainingError};
use crate::model::{export_record, restore_record, CorefModel, RestoreReport};
use crate::optim::{
    export_optimizer, optimization_step, restore_optimizer, ModelOptimizer, OptimizerConfig,
    StepLr,
};
use crate::training::evaluation::Evaluator;
use crate::training::metrics::{EpochStats, LogCadence};

/// Epoch bound, seed and logging cadence.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Training stops before this epoch index.
    pub epoch_num: usize,
    /// Recorded in checkpoints. Drawn at random when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// First training progress percentage that logs and evaluates.
    pub log_start_pct: f64,
    pub log_step_pct: f64,
    /// First evaluation progress percentage that logs.
    pub eval_log_start_pct: f64,
    pub eval_log_step_pct: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            epoch_num: 150,
            seed: None,
            log_start_pct: 0.5,
            log_step_pct: 5.0,
            eval_log_start_pct: 10.0,
            eval_log_step_pct: 5.0,
        }
    }
}

/// What to restore before training or testing starts.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ResumeConfig {
    /// Explicit checkpoint id (`<date>-<time>.<epoch>`). Takes precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ckpt_id: Option<String>,
    /// Resume from the most recent checkpoint.
    pub loads_ckpt: bool,
    /// Resume from the best checkpoint copy.
    pub loads_best_ckpt: bool,
    /// Restore parameters only; start a new optimizer and schedule.
    pub uses_new_optimizer: bool,
    /// Restore parameters only; start over at `optimizer.initial_lr`.
    pub sets_new_lr: bool,
}

impl ResumeConfig {
    pub fn selector(&self) -> Result<Option<CheckpointSelector>, CheckpointError> {
        if let Some(id) = &self.ckpt_id {
            return Ok(Some(CheckpointSelector::Id(id.parse()?)));
        }
        if self.loads_best_ckpt {
            return Ok(Some(CheckpointSelector::Best));
        }
        Ok(self.loads_ckpt.then_some(CheckpointSelector::Latest))
    }

    /// Whether optimizer and schedule state are restored with the parameters.
    pub fn keeps_optimizer(&self) -> bool {
        !(self.uses_new_optimizer || self.sets_new_lr)
    }
}

/// External pieces the trainer drives.
pub struct Collaborators<I> {
    pub batches: Box<dyn BatchSource<Input = I>>,
    pub gold: Box<dyn GoldLabelSource>,
    pub sink: Box<dyn PredictionSink>,
    pub evaluator: Box<dyn Evaluator>,
}

/// Summary of one training epoch.
#[derive(Debug, Clone)]
pub struct EpochSummary {
    pub epoch_idx: usize,
    pub avg_loss: f64,
    pub batches: usize,
    pub elapsed: Duration,
    /// Validation passes run during the epoch, including the final one.
    pub evaluations: usize,
    pub valid_score: f64,
}

/// Drives epochs of optimization with interleaved validation, and owns the
/// resumable run state.
///
/// Training runs `M` on the autodiff backend `B`; validation and testing run
/// `M::valid()` on its inner backend.
pub struct Trainer<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + CorefModel<B>,
    M::Input: 'static,
{
    pub(crate) config: TrainerConfig,
    resume: ResumeConfig,
    optimizer_config: OptimizerConfig,
    pub(crate) model: M,
    optimizer: ModelOptimizer<M, B>,
    scheduler: StepLr,
    device: B::Device,
    pub(crate) checkpoints: CheckpointManager,
    pub(crate) batches: Box<dyn BatchSource<Input = M::Input>>,
    pub(crate) gold: Box<dyn GoldLabelSource>,
    pub(crate) sink: Box<dyn PredictionSink>,
    pub(crate) evaluator: Box<dyn Evaluator>,
    epoch_idx: usize,
    pub(crate) max_score_seen: f64,
    seed: u64,
}

impl<B, M> Trainer<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + CorefModel<B>,
    M::InnerModule: CorefModel<B::InnerBackend, Input = M::Input>,
    M::Input: 'static,
{
    pub fn new(
        config: RunnerConfig,
        model: M,
        device: B::Device,
        collaborators: Collaborators<M::Input>,
    ) -> Self {
        let seed = config.training.seed.unwrap_or_else(rand::random);
        Trainer {
            optimizer: config.optimizer.build_optimizer(),
            scheduler: config.optimizer.build_scheduler(),
            checkpoints: CheckpointManager::new(&config.checkpoint),
            config: config.training,
            resume: config.resume,
            optimizer_config: config.optimizer,
            model,
            device,
            batches: collaborators.batches,
            gold: collaborators.gold,
            sink: collaborators.sink,
            evaluator: collaborators.evaluator,
            epoch_idx: 0,
            max_score_seen: 0.0,
            seed,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn epoch_idx(&self) -> usize {
        self.epoch_idx
    }

    pub fn max_score_seen(&self) -> f64 {
        self.max_score_seen
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn scheduler(&self) -> &StepLr {
        &self.scheduler
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    /// Resume if requested, then train every remaining epoch.
    pub fn train(&mut self) -> Result<Vec<EpochSummary>, TrainingError> {
        self.resume()?;

        let start_epoch_idx = self.epoch_idx;
        info!(
            seed = self.seed,
            "training epochs {start_epoch_idx}..{}", self.config.epoch_num
        );

        let mut summaries = Vec::new();
        for epoch_idx in start_epoch_idx..self.config.epoch_num {
            self.epoch_idx = epoch_idx;
            summaries.push(self.run_epoch()?);
        }
        Ok(summaries)
    }

    /// Resume if requested, then evaluate the test split and save its
    /// predictions.
    pub fn test(&mut self) -> Result<f64, TrainingError> {
        self.resume()?;
        self.evaluate(Split::Test, true)
    }

    /// Load the checkpoint selected by the resume configuration, if any.
    pub fn resume(&mut self) -> Result<Option<PathBuf>, TrainingError> {
        let Some(selector) = self.resume.selector()? else {
            return Ok(None);
        };
        let loaded = self.checkpoints.load(&selector)?;
        self.import_state(loaded.state)?;
        info!(
            "resuming at epoch {} with best score {}",
            self.epoch_idx, self.max_score_seen
        );
        Ok(Some(loaded.path))
    }

    fn run_epoch(&mut self) -> Result<EpochSummary, TrainingError> {
        let epoch_idx = self.epoch_idx;
        info!("starting epoch {epoch_idx}");
        info!("training");

        let mut stats = EpochStats::start();
        let mut cadence = LogCadence::new(self.config.log_start_pct, self.config.log_step_pct);
        let mut evaluations = 0;

        for batch in self.batches.generate(Split::Train)? {
            let batch = batch?;
            let (model, outcome) = optimization_step(
                self.model.clone(),
                &mut self.optimizer,
                &mut self.scheduler,
                &batch.input,
            )
            .map_err(|failure| failure.at(epoch_idx, stats.batch_count() + 1))?;
            self.model = model;
            stats.record(outcome.loss);

            let crossed = cadence.crossed(batch.progress_pct);
            if crossed > 0 {
                info!(
                    "{}%, avg_train_loss: {:.6}, time: {:.1}s",
                    batch.progress_pct as u32,
                    stats.average_loss(),
                    stats.elapsed().as_secs_f64()
                );
            }
            // one validation pass per threshold crossed
            for _ in 0..crossed {
                self.evaluate(Split::Valid, false)?;
                evaluations += 1;
            }
        }

        if stats.batch_count() == 0 {
            return Err(TrainingError::EmptySplit(Split::Train.to_string()));
        }

        let elapsed = stats.elapsed();
        info!(
            "avg_train_loss: {:.6}, avg_train_time: {:.1}s",
            stats.average_loss(),
            elapsed.as_secs_f64()
        );

        let valid_score = self.evaluate(Split::Valid, false)?;
        Ok(EpochSummary {
            epoch_idx,
            avg_loss: stats.average_loss(),
            batches: stats.batch_count(),
            elapsed,
            evaluations: evaluations + 1,
            valid_score,
        })
    }

    /// Record a validation score. Saves a checkpoint when the score beats both
    /// this run's best and the shared watermark.
    pub(crate) fn record_validation_score(
        &mut self,
        score: f64,
    ) -> Result<Option<CheckpointId>, TrainingError> {
        if score.is_nan() || score <= self.max_score_seen {
            return Ok(None);
        }
        self.max_score_seen = score;
        if !self.checkpoints.check_and_update_watermark(score)? {
            info!("score {score} is a run best but not above the recorded best, not saving");
            return Ok(None);
        }
        let state = self.export_state()?;
        let id = self.checkpoints.save(&state)?;
        Ok(Some(id))
    }

    /// Snapshot of everything needed to resume this run.
    pub fn export_state(&self) -> Result<RunState, CheckpointError> {
        Ok(RunState {
            epoch_idx: self.epoch_idx,
            max_score_seen: self.max_score_seen,
            seed: self.seed,
            model: export_record(&self.model)?,
            optimizer: export_optimizer(&self.optimizer)?,
            lr_scheduler: self.scheduler.state().clone(),
        })
    }

    /// Replace the in-memory run state with `state`. Training continues at
    /// the epoch after the one the state was taken in. Optimizer and schedule
    /// are restored unless the resume configuration asks for fresh ones.
    pub fn import_state(&mut self, state: RunState) -> Result<RestoreReport, CheckpointError> {
        let resume_epoch = state.resume_epoch();
        let (model, report) = restore_record(self.model.clone(), &state.model, &self.device)?;
        for name in &report.unknown {
            debug!("skipping checkpoint parameter {name}: not in model");
        }
        for name in &report.shape_mismatch {
            warn!("skipping checkpoint parameter {name}: shape differs from model");
        }
        if !report.missing.is_empty() {
            info!(
                "{} model parameters not in checkpoint keep their initial values",
                report.missing.len()
            );
        }

        let (optimizer, scheduler) = if self.resume.keeps_optimizer() {
            let optimizer = restore_optimizer(
                self.optimizer_config.build_optimizer(),
                state.optimizer,
                &self.device,
            )?;
            (optimizer, StepLr::from_state(state.lr_scheduler))
        } else {
            info!("starting a fresh optimizer at lr {}", self.optimizer_config.initial_lr);
            (
                self.optimizer_config.build_optimizer(),
                self.optimizer_config.build_scheduler(),
            )
        };

        if state.seed != self.seed {
            debug!("checkpoint seed {} differs from run seed {}", state.seed, self.seed);
        }
        self.model = model;
        self.optimizer = optimizer;
        self.scheduler = scheduler;
        self.epoch_idx = resume_epoch;
        self.max_score_seen = state.max_score_seen;
        Ok(report)
    }
}
