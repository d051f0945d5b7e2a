use std::time::Instant;

use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use tracing::{info, warn};

use crate::coref::{mention_map, Cluster, MentionMap, PredictionRecord};
use crate::data::Split;
use crate::error::TrainingError;
use crate::model::CorefModel;
use crate::training::metrics::LogCadence;
use crate::training::trainer::Trainer;

/// Accumulates predicted-vs-gold clusterings over a split and reduces them
/// to a single score.
pub trait Evaluator {
    /// Forget everything accumulated so far.
    fn reset(&mut self);

    fn update(
        &mut self,
        predicted: &[Cluster],
        gold: &[Cluster],
        mention_to_predicted: &MentionMap,
        mention_to_gold: &MentionMap,
    );

    /// F1-like score over everything accumulated since the last reset.
    fn f1(&self) -> f64;
}

impl<B, M> Trainer<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + CorefModel<B>,
    M::InnerModule: CorefModel<B::InnerBackend, Input = M::Input>,
    M::Input: 'static,
{
    /// Score the model on `split` in inference mode.
    ///
    /// With `saves_results` the raw predictions go to the prediction sink.
    /// A validation score that beats this run's best is checked against the
    /// shared watermark and may trigger a checkpoint.
    pub fn evaluate(&mut self, split: Split, saves_results: bool) -> Result<f64, TrainingError> {
        info!("evaluating {split}");
        let model = self.model.valid();
        self.evaluator.reset();

        let mut cadence =
            LogCadence::new(self.config.eval_log_start_pct, self.config.eval_log_step_pct);
        let started = Instant::now();
        let mut batch_count = 0usize;
        let mut predictions = Vec::new();

        for batch in self.batches.generate(split)? {
            let batch = batch?;
            batch_count += 1;

            let prediction = model.predict(&batch.input)?;
            let gold = self.gold.gold_clusters(split, &batch.example_id)?;
            let mention_to_gold = mention_map(&gold);
            self.evaluator.update(
                &prediction.clusters,
                &gold,
                &prediction.mention_to_cluster,
                &mention_to_gold,
            );

            if cadence.crossed(batch.progress_pct) > 0 {
                info!(
                    "{}%, time: {:.1}s, f1: {:.4}",
                    batch.progress_pct as u32,
                    started.elapsed().as_secs_f64(),
                    self.evaluator.f1()
                );
            }

            if saves_results {
                predictions.push(PredictionRecord::new(batch.example_id, &prediction));
            }
        }

        if batch_count == 0 {
            warn!("split {split} produced no batches");
        }

        let score = self.evaluator.f1();
        info!(
            "avg_{split}_time: {:.1}s, f1: {score:.4}",
            started.elapsed().as_secs_f64()
        );

        if saves_results {
            self.sink.save(split, &predictions);
        }
        if split == Split::Valid {
            self.record_validation_score(score)?;
        }
        Ok(score)
    }
}
