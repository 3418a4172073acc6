pub mod artifacts;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod forest;
pub mod lazy;
pub mod models;
pub mod pricing;
pub mod recognizer;
pub mod similarity;
pub mod templates;

pub use classifier::{Classifier, ForestClassifier, build_classifier};
pub use config::{ClassifierKind, DecisionPolicy, RecognizerConfig};
pub use dataset::DatasetIndex;
pub use error::{ExtractionError, RecognitionError, Result};
pub use features::{FeatureExtractor, FeatureLayout, FeatureVector};
pub use forest::{ForestConfig, TrainedModel, TrainingReport};
pub use models::{ClassScore, Contour, Decision, Prediction, ScoreKind};
pub use pricing::PriceTable;
pub use recognizer::{HealthReport, RecognitionReport, Recognizer};
pub use similarity::SimilarityWeights;
pub use templates::{TemplateConfig, TemplateMatch, TemplateMatcher, TemplateStore};
