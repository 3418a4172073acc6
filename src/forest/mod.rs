//! Feature extraction → standardisation → tree ensemble → confidence decision

pub mod ensemble;
pub mod scaler;
pub mod split;

use ndarray::{Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::DecisionPolicy;
use crate::dataset::DatasetIndex;
use crate::error::{RecognitionError, Result};
use crate::features::{FeatureExtractor, FeatureLayout, FeatureVector};
use crate::models::{ClassScore, Decision, Prediction, ScoreKind};

pub use ensemble::{MaxFeatures, RandomForest};
pub use scaler::StandardScaler;
pub use split::{Split, stratified_split};

/// Training parameters for the forest pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// Share of every class held out for testing
    pub test_ratio: f64,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: Some(25),
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: MaxFeatures::Fraction(0.5),
            test_ratio: 0.2,
            seed: 42,
        }
    }
}

impl ForestConfig {
    /// Reject parameters the forest cannot be trained with
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(RecognitionError::InvalidConfig(msg));
        if self.n_trees == 0 {
            return invalid("n_trees must be at least 1".into());
        }
        if self.max_depth == Some(0) {
            return invalid("max_depth must be at least 1 when set".into());
        }
        if self.min_samples_split < 2 {
            return invalid(format!("min_samples_split must be at least 2, got {}", self.min_samples_split));
        }
        if self.min_samples_leaf == 0 {
            return invalid("min_samples_leaf must be at least 1".into());
        }
        if !(0.0..1.0).contains(&self.test_ratio) {
            return invalid(format!("test_ratio must be within [0, 1), got {}", self.test_ratio));
        }
        if let MaxFeatures::Fraction(f) = self.max_features {
            if !(f > 0.0 && f <= 1.0) {
                return invalid(format!("max_features fraction must be within (0, 1], got {}", f));
            }
        }
        Ok(())
    }
}

/// Accuracy figures of one training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub run_id: Uuid,
    pub train_samples: usize,
    pub test_samples: usize,
    pub classes: usize,
    pub train_accuracy: f64,
    /// Absent when the test partition is empty
    pub test_accuracy: Option<f64>,
}

/// Scaler, forest and label list produced by one training run
#[derive(Debug)]
pub struct TrainedModel {
    pub run_id: Uuid,
    pub layout: FeatureLayout,
    pub scaler: StandardScaler,
    pub forest: RandomForest,
    pub labels: Vec<String>,
}

impl TrainedModel {
    /// Per-class probabilities in label order
    pub fn probabilities(&self, features: &FeatureVector) -> Result<Vec<f64>> {
        let expected = self.layout.len();
        if features.len() != expected {
            return Err(RecognitionError::FeatureLength {
                expected,
                actual: features.len(),
            });
        }
        let scaled = self.scaler.transform_one(features.as_slice());
        let row = Array2::from_shape_vec((1, scaled.len()), scaled)
            .map_err(|e| RecognitionError::Training(e.to_string()))?;
        Ok(self.forest.predict_proba(row.view()).row(0).to_vec())
    }

    /// Classify a feature vector and apply the acceptance threshold
    pub fn predict(&self, features: &FeatureVector, policy: &DecisionPolicy) -> Result<Prediction> {
        let probabilities = self.probabilities(features)?;
        let best = ensemble::argmax(&probabilities);
        let confidence = (probabilities.get(best).copied().unwrap_or(0.0) * 100.0).clamp(0.0, 100.0);
        let label = self
            .labels
            .get(best)
            .cloned()
            .ok_or_else(|| RecognitionError::MismatchedArtifact(format!("no label for class index {}", best)))?;

        let scores = self
            .labels
            .iter()
            .zip(&probabilities)
            .map(|(l, p)| ClassScore::new(l.clone(), p * 100.0))
            .collect();

        let decision = if policy.accepts(confidence) {
            Decision::Accept
        } else {
            Decision::Reject {
                reason: format!("Low confidence ({:.2}%). Please provide clearer image.", confidence),
            }
        };

        Ok(Prediction {
            label,
            confidence,
            scores,
            score_kind: ScoreKind::Probabilities,
            decision,
        })
    }
}

/// Fit scaler and forest on a stratified training partition and score both partitions
pub fn train(
    features: &[FeatureVector],
    targets: &[usize],
    labels: Vec<String>,
    layout: FeatureLayout,
    config: &ForestConfig,
) -> Result<(TrainedModel, TrainingReport)> {
    layout.validate()?;
    config.validate()?;
    if features.is_empty() {
        return Err(RecognitionError::Training("no training samples".into()));
    }
    if features.len() != targets.len() {
        return Err(RecognitionError::Training(format!(
            "{} feature vectors but {} targets",
            features.len(),
            targets.len()
        )));
    }
    if let Some(&bad) = targets.iter().find(|&&t| t >= labels.len()) {
        return Err(RecognitionError::Training(format!(
            "target {} out of range for {} labels",
            bad,
            labels.len()
        )));
    }
    let dim = layout.len();
    if let Some(v) = features.iter().find(|v| v.len() != dim) {
        return Err(RecognitionError::FeatureLength {
            expected: dim,
            actual: v.len(),
        });
    }

    let flat: Vec<f64> = features.iter().flat_map(|v| v.as_slice().iter().copied()).collect();
    let records = Array2::from_shape_vec((features.len(), dim), flat)
        .map_err(|e| RecognitionError::Training(e.to_string()))?;

    let split = stratified_split(targets, config.test_ratio, config.seed);
    let x_train = records.select(Axis(0), &split.train);
    let x_test = records.select(Axis(0), &split.test);
    let y_train: Vec<usize> = split.train.iter().map(|&i| targets[i]).collect();
    let y_test: Vec<usize> = split.test.iter().map(|&i| targets[i]).collect();

    let scaler = StandardScaler::fit(x_train.view());
    let x_train = scaler.transform(x_train.view());
    let x_test = scaler.transform(x_test.view());

    info!(
        train = y_train.len(),
        test = y_test.len(),
        classes = labels.len(),
        trees = config.n_trees,
        "training random forest"
    );
    let forest = RandomForest::fit(x_train.view(), &y_train, labels.len(), config)?;

    let train_accuracy = forest.score(x_train.view(), &y_train);
    let test_accuracy = if y_test.is_empty() {
        None
    } else {
        Some(forest.score(x_test.view(), &y_test))
    };
    info!(train_accuracy, ?test_accuracy, "training finished");

    let run_id = Uuid::new_v4();
    let report = TrainingReport {
        run_id,
        train_samples: y_train.len(),
        test_samples: y_test.len(),
        classes: labels.len(),
        train_accuracy,
        test_accuracy,
    };
    let model = TrainedModel {
        run_id,
        layout,
        scaler,
        forest,
        labels,
    };
    Ok((model, report))
}

/// Extract features for every image of a dataset and train on them.
/// Images that fail to decode are skipped.
pub fn train_from_dataset(
    index: &DatasetIndex,
    layout: FeatureLayout,
    config: &ForestConfig,
) -> Result<(TrainedModel, TrainingReport)> {
    config.validate()?;
    let extractor = FeatureExtractor::new(layout.clone())?;
    let samples = index.samples();
    info!(images = samples.len(), classes = index.classes.len(), "extracting features");

    let extracted: Vec<Option<(FeatureVector, usize)>> = samples
        .par_iter()
        .map(|(path, class)| match extractor.extract_path(path) {
            Ok(features) => Some((features, *class)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping image");
                None
            }
        })
        .collect();

    let (features, targets): (Vec<FeatureVector>, Vec<usize>) = extracted.into_iter().flatten().unzip();
    if features.is_empty() {
        return Err(RecognitionError::Dataset(format!(
            "no usable images under {}",
            index.root.display()
        )));
    }

    train(&features, &targets, index.labels(), layout, config)
}
