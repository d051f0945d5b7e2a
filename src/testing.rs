//! In-memory fakes for exercising the harness without a real model or corpus.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use burn::backend::{Autodiff, NdArray};
use burn::module::Param;
use burn::prelude::*;
use burn::tensor::ElementConversion;

use crate::checkpoint::CheckpointConfig;
use crate::config::RunnerConfig;
use crate::coref::{mention_map, Cluster, CorefPrediction, MentionMap, PredictionRecord, Span};
use crate::data::{Batch, BatchSource, Batches, GoldLabelSource, PredictionSink, Split};
use crate::error::ModelError;
use crate::model::CorefModel;
use crate::training::{Collaborators, Evaluator, Trainer};

pub type TestBackend = Autodiff<NdArray>;

#[derive(Debug, Clone, Default)]
pub struct ToyInput {
    pub target: f32,
    pub clusters: Vec<Cluster>,
    /// Make the forward pass fail.
    pub fail: bool,
}

impl ToyInput {
    pub fn target(target: f32) -> Self {
        ToyInput {
            target,
            ..ToyInput::default()
        }
    }

    pub fn failing() -> Self {
        ToyInput {
            fail: true,
            ..ToyInput::default()
        }
    }

    pub fn with_clusters(mut self, clusters: Vec<Cluster>) -> Self {
        self.clusters = clusters;
        self
    }
}

/// One-weight regression: `out = w + b`, `loss = (out - target)^2`.
/// Predictions echo the clusters carried by the input.
#[derive(Module, Debug)]
pub struct ToyModel<B: Backend> {
    weight: Param<Tensor<B, 1>>,
    bias: Param<Tensor<B, 1>>,
}

impl<B: Backend> ToyModel<B> {
    pub fn new(device: &B::Device) -> Self {
        ToyModel {
            weight: Param::from_tensor(Tensor::from_floats([0.5], device)),
            bias: Param::from_tensor(Tensor::zeros([1], device)),
        }
    }

    pub fn weight(&self) -> f32 {
        self.weight.val().into_scalar().elem()
    }

    pub fn bias(&self) -> f32 {
        self.bias.val().into_scalar().elem()
    }
}

impl<B: Backend> CorefModel<B> for ToyModel<B> {
    type Input = ToyInput;

    fn loss(&self, input: &ToyInput) -> Result<Tensor<B, 1>, ModelError> {
        if input.fail {
            return Err(ModelError::Forward("injected failure".into()));
        }
        let residual = self.weight.val() + self.bias.val() - input.target;
        Ok(residual.powf_scalar(2.0))
    }

    fn predict(&self, input: &ToyInput) -> Result<CorefPrediction, ModelError> {
        if input.fail {
            return Err(ModelError::Predict("injected failure".into()));
        }
        let spans: Vec<Span> = input.clusters.iter().flatten().copied().collect();
        Ok(CorefPrediction {
            top_starts: spans.iter().map(|s| s.start).collect(),
            top_ends: spans.iter().map(|s| s.end).collect(),
            antecedents: vec![None; spans.len()],
            clusters: input.clusters.clone(),
            mention_to_cluster: mention_map(&input.clusters),
        })
    }
}

/// An earlier layout of [`ToyModel`] with an extra layer and a configurable
/// weight width, for restore tests.
#[derive(Module, Debug)]
pub struct LegacyToyModel<B: Backend> {
    weight: Param<Tensor<B, 1>>,
    bias: Param<Tensor<B, 1>>,
    old_layer: Param<Tensor<B, 1>>,
}

impl<B: Backend> LegacyToyModel<B> {
    pub fn new(weight: &[f32], device: &B::Device) -> Self {
        LegacyToyModel {
            weight: Param::from_tensor(Tensor::from_floats(weight, device)),
            bias: Param::from_tensor(Tensor::from_floats([0.25], device)),
            old_layer: Param::from_tensor(Tensor::ones([3], device)),
        }
    }
}

/// Serves fixed batch lists per split.
pub struct VecBatchSource<I> {
    splits: HashMap<Split, Vec<Batch<I>>>,
}

impl<I: Clone + 'static> VecBatchSource<I> {
    pub fn new() -> Self {
        VecBatchSource {
            splits: HashMap::new(),
        }
    }

    pub fn with_split(mut self, split: Split, batches: Vec<Batch<I>>) -> Self {
        self.splits.insert(split, batches);
        self
    }
}

impl<I: Clone + 'static> Default for VecBatchSource<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Clone + 'static> BatchSource for VecBatchSource<I> {
    type Input = I;

    fn generate(&self, split: Split) -> Result<Batches<I>, ModelError> {
        let batches = self.splits.get(&split).cloned().unwrap_or_default();
        Ok(Box::new(batches.into_iter().map(Ok)))
    }
}

/// `count` batches with evenly spaced progress ending at 100.
pub fn progress_batches(count: usize, input: &ToyInput) -> Vec<Batch<ToyInput>> {
    (1..=count)
        .map(|i| {
            let pct = i as f64 * 100.0 / count as f64;
            Batch::new(pct, format!("doc-{i}"), input.clone())
        })
        .collect()
}

#[derive(Default)]
pub struct MapGold {
    pub clusters: HashMap<String, Vec<Cluster>>,
}

impl GoldLabelSource for MapGold {
    fn gold_clusters(&self, _split: Split, example_id: &str) -> Result<Vec<Cluster>, ModelError> {
        Ok(self.clusters.get(example_id).cloned().unwrap_or_default())
    }
}

#[derive(Debug, Default)]
pub struct EvalLog {
    pub scores: VecDeque<f64>,
    pub current: f64,
    pub resets: usize,
    pub updates: usize,
    pub predicted_mentions: usize,
    pub gold_mentions: usize,
}

/// Reports a scripted score per pass. Each reset moves to the next score;
/// once the script runs out the last score repeats.
#[derive(Clone, Default)]
pub struct ScriptedEvaluator {
    pub log: Rc<RefCell<EvalLog>>,
}

impl ScriptedEvaluator {
    pub fn new(scores: impl IntoIterator<Item = f64>) -> Self {
        let log = EvalLog {
            scores: scores.into_iter().collect(),
            ..EvalLog::default()
        };
        ScriptedEvaluator {
            log: Rc::new(RefCell::new(log)),
        }
    }
}

impl Evaluator for ScriptedEvaluator {
    fn reset(&mut self) {
        let mut log = self.log.borrow_mut();
        log.resets += 1;
        if let Some(next) = log.scores.pop_front() {
            log.current = next;
        }
    }

    fn update(
        &mut self,
        _predicted: &[Cluster],
        _gold: &[Cluster],
        mention_to_predicted: &MentionMap,
        mention_to_gold: &MentionMap,
    ) {
        let mut log = self.log.borrow_mut();
        log.updates += 1;
        log.predicted_mentions += mention_to_predicted.len();
        log.gold_mentions += mention_to_gold.len();
    }

    fn f1(&self) -> f64 {
        self.log.borrow().current
    }
}

#[derive(Clone, Default)]
pub struct RecordingSink {
    pub saved: Rc<RefCell<Vec<(Split, Vec<PredictionRecord>)>>>,
}

impl PredictionSink for RecordingSink {
    fn save(&mut self, split: Split, records: &[PredictionRecord]) {
        self.saved.borrow_mut().push((split, records.to_vec()));
    }
}

/// Config writing checkpoints under `dir` with a fixed timestamp.
pub fn toy_config(dir: &std::path::Path, timestamp: &str) -> RunnerConfig {
    let mut config = RunnerConfig {
        checkpoint: CheckpointConfig {
            ckpts_dir: dir.to_path_buf(),
            timestamp: Some(timestamp.to_string()),
            ..CheckpointConfig::default()
        },
        ..RunnerConfig::default()
    };
    config.training.epoch_num = 1;
    config.training.seed = Some(7);
    config
}

pub struct ToyHarness {
    pub trainer: Trainer<TestBackend, ToyModel<TestBackend>>,
    pub evaluator: ScriptedEvaluator,
    pub sink: RecordingSink,
}

pub fn toy_trainer(
    config: RunnerConfig,
    source: VecBatchSource<ToyInput>,
    gold: MapGold,
    scores: &[f64],
) -> ToyHarness {
    let evaluator = ScriptedEvaluator::new(scores.iter().copied());
    let sink = RecordingSink::default();
    let device: <TestBackend as Backend>::Device = Default::default();
    let trainer = Trainer::new(
        config,
        ToyModel::<TestBackend>::new(&device),
        device,
        Collaborators {
            batches: Box::new(source),
            gold: Box::new(gold),
            sink: Box::new(sink.clone()),
            evaluator: Box::new(evaluator.clone()),
        },
    );
    ToyHarness {
        trainer,
        evaluator,
        sink,
    }
}
