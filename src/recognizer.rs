use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;
use serde::Serialize;
use tracing::{info, warn};

use crate::classifier::{Classifier, build_classifier};
use crate::config::RecognizerConfig;
use crate::error::{ExtractionError, Result};
use crate::models::{ClassScore, Decision, Prediction, ScoreKind};
use crate::pricing::PriceTable;

/// Outcome reported for one request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecognitionReport {
    Success {
        fruit: String,
        confidence: f64,
        price: u32,
        unit: String,
        top_predictions: Vec<ClassScore>,
        #[serde(skip_serializing_if = "Option::is_none")]
        probabilities: Option<BTreeMap<String, f64>>,
    },
    Reject {
        reason: String,
        top_match: String,
        confidence: f64,
    },
    Error {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub classifier: String,
    pub ready: bool,
    pub classes: usize,
    pub labels: Vec<String>,
}

/// Request boundary in front of a classifier.
///
/// Every failure, including a panic inside the classifier, becomes an `ERROR` report so
/// one bad image never takes down the process or affects later requests.
pub struct Recognizer {
    classifier: Arc<dyn Classifier>,
    prices: PriceTable,
    top_k: usize,
}

impl Recognizer {
    pub fn new(classifier: Arc<dyn Classifier>, prices: PriceTable) -> Self {
        Self {
            classifier,
            prices,
            top_k: 3,
        }
    }

    pub fn from_config(config: &RecognizerConfig) -> Self {
        Self {
            classifier: build_classifier(config),
            prices: config.prices.clone(),
            top_k: config.templates.top_k,
        }
    }

    pub fn classifier(&self) -> &Arc<dyn Classifier> {
        &self.classifier
    }

    /// Load templates or model up front instead of on the first request
    pub fn warm_up(&self) -> Result<()> {
        self.classifier.prepare()
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "ok",
            classifier: self.classifier.name().to_string(),
            ready: self.classifier.is_ready(),
            classes: self.classifier.class_count(),
            labels: self.classifier.labels(),
        }
    }

    pub fn recognize_path(&self, path: impl AsRef<Path>) -> RecognitionReport {
        match std::fs::read(path.as_ref()) {
            Ok(bytes) => self.recognize_bytes(&bytes),
            Err(e) => self.failure(&ExtractionError::Io(e).into()),
        }
    }

    pub fn recognize_bytes(&self, bytes: &[u8]) -> RecognitionReport {
        match image::load_from_memory(bytes) {
            Ok(image) => self.recognize_image(&image),
            Err(e) => self.failure(&ExtractionError::Decode(e).into()),
        }
    }

    pub fn recognize_image(&self, image: &DynamicImage) -> RecognitionReport {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.classifier.classify(image)));
        match outcome {
            Ok(Ok(prediction)) => self.report(prediction),
            Ok(Err(e)) => self.failure(&e),
            Err(_) => {
                warn!("classifier panicked while processing image");
                RecognitionReport::Error {
                    reason: "internal error while processing image".to_string(),
                }
            }
        }
    }

    fn report(&self, prediction: Prediction) -> RecognitionReport {
        match &prediction.decision {
            Decision::Accept => {
                info!(fruit = %prediction.label, confidence = prediction.confidence, "detected");
                let top_predictions = prediction
                    .top(self.top_k)
                    .into_iter()
                    .map(|s| ClassScore::new(s.label, round2(s.confidence)))
                    .collect();
                let probabilities = match prediction.score_kind {
                    ScoreKind::Probabilities => Some(
                        prediction
                            .scores
                            .iter()
                            .map(|s| (s.label.clone(), round2(s.confidence)))
                            .collect(),
                    ),
                    ScoreKind::Ranked => None,
                };
                RecognitionReport::Success {
                    price: self.prices.price_for(&prediction.label),
                    unit: self.prices.unit.clone(),
                    confidence: round2(prediction.confidence),
                    fruit: prediction.label,
                    top_predictions,
                    probabilities,
                }
            }
            Decision::Reject { reason } => {
                info!(top_match = %prediction.label, confidence = prediction.confidence, "rejected");
                RecognitionReport::Reject {
                    reason: reason.clone(),
                    top_match: prediction.label.clone(),
                    confidence: round2(prediction.confidence),
                }
            }
        }
    }

    fn failure(&self, error: &crate::RecognitionError) -> RecognitionReport {
        warn!(error = %error, "recognition failed");
        RecognitionReport::Error {
            reason: error.to_string(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
