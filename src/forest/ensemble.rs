use linfa::DatasetBase;
use linfa::traits::{Fit, Predict};
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RecognitionError, Result};
use crate::forest::ForestConfig;

/// How many feature columns each tree sees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    All,
    Sqrt,
    Fraction(f64),
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        let k = match *self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f) as usize,
        };
        k.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ForestTree {
    /// Feature columns this tree was fitted on, ascending
    features: Vec<usize>,
    tree: DecisionTree<f64, usize>,
}

/// Bagged ensemble of CART trees.
///
/// Each tree is fitted on a bootstrap sample of the rows restricted to a random subset
/// of the feature columns. Class probabilities are the share of tree votes.
#[derive(Debug, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    n_classes: usize,
    trees: Vec<ForestTree>,
}

impl RandomForest {
    /// Fit `config.n_trees` trees in parallel; the result only depends on `config.seed`
    pub fn fit(
        records: ArrayView2<f64>,
        targets: &[usize],
        n_classes: usize,
        config: &ForestConfig,
    ) -> Result<Self> {
        if records.nrows() == 0 || records.nrows() != targets.len() {
            return Err(RecognitionError::Training(format!(
                "need matching non-empty records and targets, got {} rows and {} targets",
                records.nrows(),
                targets.len()
            )));
        }
        if config.n_trees == 0 {
            return Err(RecognitionError::Training("forest needs at least one tree".into()));
        }

        let targets = Array1::from(targets.to_vec());
        let n_features = records.ncols();
        let subset_len = config.max_features.resolve(n_features);
        debug!(trees = config.n_trees, features = n_features, subset_len, "fitting random forest");

        let trees = (0..config.n_trees)
            .into_par_iter()
            .map(|index| fit_tree(records, &targets, subset_len, config, index))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            n_features,
            n_classes,
            trees,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Share of tree votes per class, one row per record
    pub fn predict_proba(&self, records: ArrayView2<f64>) -> Array2<f64> {
        let mut votes = Array2::<f64>::zeros((records.nrows(), self.n_classes));
        for forest_tree in &self.trees {
            let subset = records.select(Axis(1), &forest_tree.features);
            let dataset = DatasetBase::from(subset);
            let predictions: Array1<usize> = forest_tree.tree.predict(&dataset);
            for (row, &class) in predictions.iter().enumerate() {
                if class < self.n_classes {
                    votes[[row, class]] += 1.0;
                }
            }
        }
        if !self.trees.is_empty() {
            votes /= self.trees.len() as f64;
        }
        votes
    }

    /// Most voted class per record; the lowest class index wins a tie
    pub fn predict(&self, records: ArrayView2<f64>) -> Vec<usize> {
        self.predict_proba(records)
            .axis_iter(Axis(0))
            .map(|row| argmax(&row.to_vec()))
            .collect()
    }

    /// Share of records whose predicted class equals the target
    pub fn score(&self, records: ArrayView2<f64>, targets: &[usize]) -> f64 {
        if targets.is_empty() {
            return 0.0;
        }
        let correct = self
            .predict(records)
            .iter()
            .zip(targets)
            .filter(|(p, t)| p == t)
            .count();
        correct as f64 / targets.len() as f64
    }
}

/// Index of the first maximum
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

fn tree_seed(seed: u64, index: usize) -> u64 {
    seed ^ (index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn fit_tree(
    records: ArrayView2<f64>,
    targets: &Array1<usize>,
    subset_len: usize,
    config: &ForestConfig,
    index: usize,
) -> Result<ForestTree> {
    let mut rng = StdRng::seed_from_u64(tree_seed(config.seed, index));
    let n_samples = records.nrows();

    let rows: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
    let mut features = sample(&mut rng, records.ncols(), subset_len).into_vec();
    features.sort_unstable();

    let x = records.select(Axis(0), &rows).select(Axis(1), &features);
    let y = targets.select(Axis(0), &rows);
    let dataset = DatasetBase::from(x).with_targets(y);

    let tree = DecisionTree::<f64, usize>::params()
        .split_quality(SplitQuality::Gini)
        .max_depth(config.max_depth)
        .min_weight_split(config.min_samples_split as f32)
        .min_weight_leaf(config.min_samples_leaf as f32)
        .fit(&dataset)
        .map_err(|e| RecognitionError::Training(format!("tree {}: {}", index, e)))?;

    Ok(ForestTree { features, tree })
}
