use std::path::PathBuf;
use std::sync::Arc;

use image::DynamicImage;
use tracing::debug;

use crate::error::{ExtractionError, RecognitionError, Result};
use crate::lazy::LazyHandle;
use crate::models::ClassScore;
use crate::similarity::{histogram_similarity, pixel_similarity};
use crate::templates::{Template, TemplateConfig, TemplateStore};

/// Best matching class for a query image
#[derive(Debug, Clone)]
pub struct TemplateMatch {
    pub label: String,
    /// Averaged combined similarity of the winning class, in [0, 1]
    pub score: f64,
    /// Highest scoring classes in percent, best first
    pub top: Vec<ClassScore>,
}

impl TemplateMatch {
    pub fn confidence(&self) -> f64 {
        self.score * 100.0
    }
}

/// Nearest-template classifier over a lazily loaded [`TemplateStore`]
#[derive(Debug)]
pub struct TemplateMatcher {
    store: LazyHandle<TemplateStore>,
}

impl TemplateMatcher {
    /// Templates are read from `root` on the first classification
    pub fn lazy(root: impl Into<PathBuf>, config: TemplateConfig) -> Self {
        let root = root.into();
        Self {
            store: LazyHandle::new("templates", move || TemplateStore::load_dir(&root, config.clone())),
        }
    }

    /// Use an already built store
    pub fn with_store(store: Arc<TemplateStore>) -> Self {
        Self {
            store: LazyHandle::ready("templates", store),
        }
    }

    /// Loaded store, loading it now if needed
    pub fn store(&self) -> Result<Arc<TemplateStore>> {
        let store = self.store.get()?;
        if store.is_empty() {
            return Err(RecognitionError::NotLoaded("template store is empty".into()));
        }
        Ok(store)
    }

    pub fn is_loaded(&self) -> bool {
        self.store.is_loaded()
    }

    /// Number of classes, zero until templates are loaded
    pub fn class_count(&self) -> usize {
        self.store.peek().map(|s| s.len()).unwrap_or(0)
    }

    /// Sorted class labels, empty until templates are loaded
    pub fn labels(&self) -> Vec<String> {
        self.store.peek().map(|s| s.labels()).unwrap_or_default()
    }

    pub fn find_best_match(&self, image: &DynamicImage) -> Result<TemplateMatch> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ExtractionError::EmptyImage {
                width: image.width(),
                height: image.height(),
            }
            .into());
        }
        let store = self.store()?;
        let query = Template::from_image(image, store.config());
        Ok(rank_classes(&store, &query))
    }
}

/// Average each class's combined similarity to the query and rank the classes.
/// Equal scores keep sorted label order, so the earlier label wins a tie.
fn rank_classes(store: &TemplateStore, query: &Template) -> TemplateMatch {
    let config = store.config();

    let mut best: Option<(usize, f64)> = None;
    let mut all_scores: Vec<(usize, f64)> = Vec::with_capacity(store.len());

    for (index, class) in store.classes().iter().enumerate() {
        let total: f64 = class
            .templates
            .iter()
            .map(|template| {
                let hist_sim = histogram_similarity(&query.histogram, &template.histogram);
                let pixel_sim = pixel_similarity(&query.pixels, &template.pixels);
                config.weights.combine(hist_sim, pixel_sim)
            })
            .sum();
        let avg_score = total / class.templates.len() as f64;
        debug!(class = %class.label, score = avg_score, "template class score");

        all_scores.push((index, avg_score));
        match best {
            Some((_, best_score)) if avg_score <= best_score => {}
            _ => best = Some((index, avg_score)),
        }
    }

    // sort_by is stable, ties stay in label order
    all_scores.sort_by(|a, b| b.1.total_cmp(&a.1));
    let top = all_scores
        .iter()
        .take(config.top_k)
        .map(|&(index, score)| ClassScore::new(store.classes()[index].label.clone(), score * 100.0))
        .collect();

    let (best_index, best_score) = best.unwrap_or((0, 0.0));
    TemplateMatch {
        label: store.classes()[best_index].label.clone(),
        score: best_score,
        top,
    }
}
