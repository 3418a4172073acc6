use std::path::PathBuf;
use std::sync::Arc;

use image::DynamicImage;

use crate::config::{ClassifierKind, DecisionPolicy, RecognizerConfig};
use crate::error::{RecognitionError, Result};
use crate::features::FeatureExtractor;
use crate::forest::TrainedModel;
use crate::lazy::LazyHandle;
use crate::models::{Decision, Prediction, ScoreKind};
use crate::templates::TemplateMatcher;

/// Anything that can name the fruit in an image
pub trait Classifier: Send + Sync {
    /// Human-readable name of the backing algorithm
    fn name(&self) -> &str;

    /// Load whatever the classifier needs; later calls are no-ops
    fn prepare(&self) -> Result<()>;

    fn is_ready(&self) -> bool;

    /// Number of known classes, zero before loading
    fn class_count(&self) -> usize;

    /// Known labels in class index order, empty before loading
    fn labels(&self) -> Vec<String>;

    fn classify(&self, image: &DynamicImage) -> Result<Prediction>;
}

impl Classifier for TemplateMatcher {
    fn name(&self) -> &str {
        "template matching"
    }

    fn prepare(&self) -> Result<()> {
        self.store().map(|_| ())
    }

    fn is_ready(&self) -> bool {
        self.is_loaded()
    }

    fn class_count(&self) -> usize {
        TemplateMatcher::class_count(self)
    }

    fn labels(&self) -> Vec<String> {
        TemplateMatcher::labels(self)
    }

    fn classify(&self, image: &DynamicImage) -> Result<Prediction> {
        let matched = self.find_best_match(image)?;
        Ok(Prediction {
            confidence: matched.confidence().clamp(0.0, 100.0),
            label: matched.label,
            scores: matched.top,
            score_kind: ScoreKind::Ranked,
            decision: Decision::Accept,
        })
    }
}

/// Forest pipeline behind the [`Classifier`] interface
#[derive(Debug)]
pub struct ForestClassifier {
    model: LazyHandle<TrainedModel>,
    policy: DecisionPolicy,
}

impl ForestClassifier {
    pub fn new(model: Arc<TrainedModel>, policy: DecisionPolicy) -> Self {
        Self {
            model: LazyHandle::ready("forest model", model),
            policy,
        }
    }

    /// The bundle at `path` is loaded on first use. A missing or unreadable bundle is
    /// `NotLoaded`; an inconsistent one stays `MismatchedArtifact`.
    pub fn lazy(path: impl Into<PathBuf>, policy: DecisionPolicy) -> Self {
        let path = path.into();
        Self {
            model: LazyHandle::new("forest model", move || {
                TrainedModel::load(&path).map_err(|e| match e {
                    RecognitionError::Io(io) => {
                        RecognitionError::NotLoaded(format!("model bundle {}: {}", path.display(), io))
                    }
                    other => other,
                })
            }),
            policy,
        }
    }

    pub fn model(&self) -> Result<Arc<TrainedModel>> {
        self.model.get()
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }
}

impl Classifier for ForestClassifier {
    fn name(&self) -> &str {
        "random forest"
    }

    fn prepare(&self) -> Result<()> {
        self.model().map(|_| ())
    }

    fn is_ready(&self) -> bool {
        self.model.is_loaded()
    }

    fn class_count(&self) -> usize {
        self.model.peek().map(|m| m.labels.len()).unwrap_or(0)
    }

    fn labels(&self) -> Vec<String> {
        self.model.peek().map(|m| m.labels.clone()).unwrap_or_default()
    }

    fn classify(&self, image: &DynamicImage) -> Result<Prediction> {
        let model = self.model()?;
        // Extract with the layout the model was trained on
        let features = FeatureExtractor::new(model.layout.clone())?.extract(image)?;
        model.predict(&features, &self.policy)
    }
}

/// Build the classifier named by the configuration; nothing is loaded yet
pub fn build_classifier(config: &RecognizerConfig) -> Arc<dyn Classifier> {
    match &config.classifier {
        ClassifierKind::Template { templates_dir } => {
            Arc::new(TemplateMatcher::lazy(templates_dir.clone(), config.templates.clone()))
        }
        ClassifierKind::Forest { model_path } => {
            Arc::new(ForestClassifier::lazy(model_path.clone(), config.decision.clone()))
        }
    }
}
