//! Sample images per class for similarity based classification

pub mod matcher;

use std::path::Path;

use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dataset::DatasetIndex;
use crate::error::{RecognitionError, Result};
use crate::features::{self, color, preprocessing};
use crate::similarity::SimilarityWeights;

pub use matcher::{TemplateMatch, TemplateMatcher};

/// Template matching parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Side length templates and queries are resized to
    pub image_size: u32,
    pub max_per_class: usize,
    pub histogram_bins: usize,
    pub weights: SimilarityWeights,
    /// Number of ranked classes reported with a match
    pub top_k: usize,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            image_size: 100,
            max_per_class: 3,
            histogram_bins: 16,
            weights: SimilarityWeights::default(),
            top_k: 3,
        }
    }
}

impl TemplateConfig {
    /// Reject parameters template matching cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.image_size == 0 {
            return Err(RecognitionError::InvalidConfig("template image_size must be at least 1".into()));
        }
        if self.max_per_class == 0 {
            return Err(RecognitionError::InvalidConfig("max_per_class must be at least 1".into()));
        }
        features::validate_bins(self.histogram_bins)?;
        let SimilarityWeights { histogram, pixel } = self.weights;
        if !(histogram.is_finite() && pixel.is_finite() && histogram >= 0.0 && pixel >= 0.0) {
            return Err(RecognitionError::InvalidConfig(format!(
                "similarity weights must be finite and non-negative, got {} and {}",
                histogram, pixel
            )));
        }
        Ok(())
    }
}

/// Normalised pixels of one sample image with its colour histogram
#[derive(Debug, Clone)]
pub struct Template {
    /// Interleaved RGB values scaled to [0, 1]
    pub pixels: Vec<f32>,
    pub histogram: Vec<f64>,
}

impl Template {
    pub fn from_image(image: &DynamicImage, config: &TemplateConfig) -> Self {
        let rgb = preprocessing::resize_rgb(image, config.image_size);
        Self::from_rgb(&rgb, config.histogram_bins)
    }

    fn from_rgb(rgb: &RgbImage, bins: usize) -> Self {
        let pixels = rgb.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
        let histogram = color::channel_histograms(rgb, bins);
        Self { pixels, histogram }
    }
}

#[derive(Debug, Clone)]
pub struct ClassTemplates {
    pub label: String,
    pub templates: Vec<Template>,
}

/// Read-only set of templates, classes in sorted label order
#[derive(Debug, Clone)]
pub struct TemplateStore {
    config: TemplateConfig,
    classes: Vec<ClassTemplates>,
}

impl TemplateStore {
    /// Build a store from in-memory images; classes are sorted by label and capped at
    /// `max_per_class` templates each
    pub fn from_images(config: TemplateConfig, classes: Vec<(String, Vec<DynamicImage>)>) -> Result<Self> {
        config.validate()?;
        let mut built: Vec<ClassTemplates> = classes
            .into_iter()
            .map(|(label, images)| ClassTemplates {
                label,
                templates: images
                    .iter()
                    .filter(|img| img.width() > 0 && img.height() > 0)
                    .take(config.max_per_class)
                    .map(|img| Template::from_image(img, &config))
                    .collect(),
            })
            .filter(|class| !class.templates.is_empty())
            .collect();
        built.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(Self {
            config,
            classes: built,
        })
    }

    /// Load up to `max_per_class` images from every class directory under `root`.
    /// Files that fail to decode are skipped; classes without any usable image are left out.
    pub fn load_dir(root: impl AsRef<Path>, config: TemplateConfig) -> Result<Self> {
        config.validate()?;
        let index = DatasetIndex::scan(root.as_ref()).map_err(|e| RecognitionError::NotLoaded(e.to_string()))?;
        info!(classes = index.classes.len(), "loading fruit templates");

        let mut classes = Vec::new();
        for class in &index.classes {
            let mut templates = Vec::new();
            for path in &class.images {
                if templates.len() >= config.max_per_class {
                    break;
                }
                match features::open_image(path) {
                    Ok(img) if img.width() > 0 && img.height() > 0 => {
                        templates.push(Template::from_image(&img, &config))
                    }
                    Ok(_) => warn!(path = %path.display(), "skipping empty template"),
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable template"),
                }
            }
            if templates.is_empty() {
                debug!(class = %class.label, "no usable templates");
                continue;
            }
            classes.push(ClassTemplates {
                label: class.label.clone(),
                templates,
            });
        }

        if classes.is_empty() {
            return Err(RecognitionError::NotLoaded(format!(
                "no templates found under {}",
                root.as_ref().display()
            )));
        }
        info!(classes = classes.len(), "loaded templates");
        Ok(Self { config, classes })
    }

    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    pub fn classes(&self) -> &[ClassTemplates] {
        &self.classes
    }

    pub fn labels(&self) -> Vec<String> {
        self.classes.iter().map(|c| c.label.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }
}
