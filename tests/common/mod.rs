mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from fruitscan for tests
pub use fruitscan::{
    ClassScore, Decision, DecisionPolicy, FeatureExtractor, FeatureLayout, FeatureVector, ForestConfig,
    PriceTable, RecognitionError, RecognitionReport, Recognizer, ScoreKind, TemplateConfig, TemplateMatcher,
    TemplateStore, TrainedModel,
};
