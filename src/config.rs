use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RecognitionError, Result};
use crate::features::FeatureLayout;
use crate::forest::ForestConfig;
use crate::pricing::PriceTable;
use crate::templates::TemplateConfig;

/// Acceptance rule for forest predictions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionPolicy {
    /// Minimum winning confidence in percent
    pub confidence_threshold: f64,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            confidence_threshold: 70.0,
        }
    }
}

impl DecisionPolicy {
    pub fn accepts(&self, confidence: f64) -> bool {
        confidence >= self.confidence_threshold
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.confidence_threshold.is_finite() && self.confidence_threshold >= 0.0) {
            return Err(RecognitionError::InvalidConfig(format!(
                "confidence_threshold must be a non-negative percentage, got {}",
                self.confidence_threshold
            )));
        }
        Ok(())
    }
}

/// Which classifier backs the recognizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierKind {
    Template { templates_dir: PathBuf },
    Forest { model_path: PathBuf },
}

impl Default for ClassifierKind {
    fn default() -> Self {
        ClassifierKind::Template {
            templates_dir: PathBuf::from("fruit_dataset/Training"),
        }
    }
}

/// Top level configuration, every section optional in the JSON file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub classifier: ClassifierKind,
    pub features: FeatureLayout,
    pub templates: TemplateConfig,
    pub forest: ForestConfig,
    pub decision: DecisionPolicy,
    pub prices: PriceTable,
}

impl RecognizerConfig {
    /// Read and validate a JSON configuration file; missing sections keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section
    pub fn validate(&self) -> Result<()> {
        self.features.validate()?;
        self.templates.validate()?;
        self.forest.validate()?;
        self.decision.validate()
    }
}
