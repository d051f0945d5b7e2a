use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A mention: an inclusive token span `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }
}

impl From<(usize, usize)> for Span {
    fn from((start, end): (usize, usize)) -> Self {
        Span { start, end }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.start, self.end)
    }
}

/// A set of mentions referring to the same entity.
pub type Cluster = Vec<Span>;

/// Maps each mention to the cluster that contains it.
pub type MentionMap = HashMap<Span, Cluster>;

/// Build the mention-to-cluster map for a clustering. A mention belongs to
/// exactly one cluster; if the input repeats a mention, the last cluster wins.
pub fn mention_map(clusters: &[Cluster]) -> MentionMap {
    clusters
        .iter()
        .flat_map(|cluster| cluster.iter().map(move |span| (*span, cluster.clone())))
        .collect()
}

/// Everything the model predicts for one example.
#[derive(Debug, Clone, Default)]
pub struct CorefPrediction {
    /// Start indices of the top-scoring candidate spans.
    pub top_starts: Vec<usize>,
    /// End indices of the top-scoring candidate spans.
    pub top_ends: Vec<usize>,
    /// For each top span, the index of its predicted antecedent (`None` for
    /// the dummy antecedent).
    pub antecedents: Vec<Option<usize>>,
    pub clusters: Vec<Cluster>,
    pub mention_to_cluster: MentionMap,
}

impl CorefPrediction {
    /// Derive clusters and the mention map from top spans and antecedent
    /// links by following each span's chain to its root.
    pub fn from_antecedents(
        top_starts: Vec<usize>,
        top_ends: Vec<usize>,
        antecedents: Vec<Option<usize>>,
    ) -> Self {
        let n = top_starts.len().min(top_ends.len()).min(antecedents.len());
        let mut cluster_of: Vec<Option<usize>> = vec![None; n];
        let mut clusters: Vec<Cluster> = Vec::new();

        for i in 0..n {
            let Some(ante) = antecedents[i].filter(|&a| a < i) else {
                continue;
            };
            let cluster_idx = match cluster_of[ante] {
                Some(idx) => idx,
                None => {
                    clusters.push(vec![Span::new(top_starts[ante], top_ends[ante])]);
                    cluster_of[ante] = Some(clusters.len() - 1);
                    clusters.len() - 1
                }
            };
            clusters[cluster_idx].push(Span::new(top_starts[i], top_ends[i]));
            cluster_of[i] = Some(cluster_idx);
        }

        let mention_to_cluster = mention_map(&clusters);
        CorefPrediction {
            top_starts,
            top_ends,
            antecedents,
            clusters,
            mention_to_cluster,
        }
    }

    pub fn top_spans(&self) -> Vec<Span> {
        self.top_starts
            .iter()
            .zip(&self.top_ends)
            .map(|(&start, &end)| Span::new(start, end))
            .collect()
    }
}

/// Serializable record of one example's predictions, handed to a
/// [`PredictionSink`](crate::data::PredictionSink).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub example_id: String,
    pub top_spans: Vec<Span>,
    pub antecedents: Vec<Option<usize>>,
    pub clusters: Vec<Cluster>,
}

impl PredictionRecord {
    pub fn new(example_id: impl Into<String>, prediction: &CorefPrediction) -> Self {
        PredictionRecord {
            example_id: example_id.into(),
            top_spans: prediction.top_spans(),
            antecedents: prediction.antecedents.clone(),
            clusters: prediction.clusters.clone(),
        }
    }
}
