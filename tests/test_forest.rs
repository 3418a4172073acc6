//! Integration tests for the random forest pipeline.
//!
//! Tests cover:
//! - Training on separable data and confidence bounds
//! - Threshold decisions
//! - Model bundle save/load cycles and run id cross-checks
//! - Training from an image dataset end to end
//! - Configuration validation and missing bundles

mod common;

use std::sync::Arc;

use fruitscan::forest::{self, MaxFeatures, RandomForest, stratified_split};
use fruitscan::{Classifier, DatasetIndex, ForestClassifier};

use common::*;

fn trained_model() -> (TrainedModel, fruitscan::TrainingReport) {
    let (features, targets) = separable_features(20);
    forest::train(
        &features,
        &targets,
        vec!["Apple".to_string(), "Banana".to_string()],
        FeatureLayout::default(),
        &small_forest_config(),
    )
    .expect("Failed to train model")
}

#[test]
fn test_training_separable_data() {
    let (model, report) = trained_model();

    assert_eq!(report.classes, 2);
    assert_eq!(report.train_samples, 32);
    assert_eq!(report.test_samples, 8);
    assert_eq!(report.train_accuracy, 1.0);
    assert_eq!(report.test_accuracy, Some(1.0));
    assert_eq!(report.run_id, model.run_id);
    assert_eq!(model.forest.n_trees(), 15);
}

#[test]
fn test_probabilities_and_confidence_bounds() -> anyhow::Result<()> {
    let (model, _) = trained_model();
    let (features, targets) = separable_features(5);

    for (vector, &target) in features.iter().zip(&targets) {
        let probabilities = model.probabilities(vector)?;
        assert_eq!(probabilities.len(), 2);
        assert!((probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-9);

        let prediction = model.predict(vector, &DecisionPolicy::default())?;
        assert!(prediction.confidence >= 0.0 && prediction.confidence <= 100.0);
        assert_eq!(prediction.label, model.labels[target]);
        assert_eq!(prediction.score_kind, ScoreKind::Probabilities);
        assert_eq!(prediction.scores.len(), 2);
    }
    Ok(())
}

#[test]
fn test_reject_below_threshold() -> anyhow::Result<()> {
    let (model, _) = trained_model();
    let (features, _) = separable_features(1);

    let strict = DecisionPolicy {
        confidence_threshold: 100.5,
    };
    let prediction = model.predict(&features[0], &strict)?;
    match &prediction.decision {
        Decision::Reject { reason } => {
            assert!(reason.starts_with("Low confidence ("), "reason {}", reason);
            assert!(reason.ends_with("%). Please provide clearer image."));
        }
        Decision::Accept => panic!("prediction above 100% should not be possible"),
    }
    assert!(matches!(
        prediction.clone().into_accepted(),
        Err(RecognitionError::LowConfidence { .. })
    ));

    let lenient = DecisionPolicy {
        confidence_threshold: 0.0,
    };
    assert!(model.predict(&features[0], &lenient)?.is_accepted());
    Ok(())
}

#[test]
fn test_wrong_feature_length_is_rejected() {
    let (model, _) = trained_model();
    let result = model.probabilities(&FeatureVector::new(vec![0.0; 10]));
    assert!(matches!(
        result,
        Err(RecognitionError::FeatureLength {
            expected: 108,
            actual: 10
        })
    ));
}

#[test]
fn test_training_is_reproducible() -> anyhow::Result<()> {
    let (features, targets) = separable_features(10);
    let labels = vec!["Apple".to_string(), "Banana".to_string()];
    let config = ForestConfig {
        n_trees: 5,
        ..ForestConfig::default()
    };

    let (a, _) = forest::train(&features, &targets, labels.clone(), FeatureLayout::default(), &config)?;
    let (b, _) = forest::train(&features, &targets, labels, FeatureLayout::default(), &config)?;
    for vector in &features {
        assert_eq!(a.probabilities(vector)?, b.probabilities(vector)?);
    }
    Ok(())
}

#[test]
fn test_invalid_training_input() {
    let (features, _) = separable_features(2);
    let labels = vec!["Apple".to_string()];

    let mismatched = forest::train(&features, &[0], labels.clone(), FeatureLayout::default(), &small_forest_config());
    assert!(matches!(mismatched, Err(RecognitionError::Training(_))));

    let out_of_range = forest::train(
        &features,
        &[0, 0, 1, 1],
        labels,
        FeatureLayout::default(),
        &small_forest_config(),
    );
    assert!(matches!(out_of_range, Err(RecognitionError::Training(_))));
}

#[test]
fn test_bundle_save_and_load() -> anyhow::Result<()> {
    let (model, _) = trained_model();
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("models").join("fruit.model");

    model.save(&path)?;
    let loaded = TrainedModel::load(&path)?;

    assert_eq!(loaded.run_id, model.run_id);
    assert_eq!(loaded.labels, model.labels);
    assert_eq!(loaded.layout, model.layout);
    assert_eq!(loaded.forest.n_trees(), model.forest.n_trees());

    let (features, _) = separable_features(3);
    for vector in &features {
        assert_eq!(loaded.probabilities(vector)?, model.probabilities(vector)?);
    }
    Ok(())
}

#[test]
fn test_mismatched_run_id_is_rejected() -> anyhow::Result<()> {
    let (model, _) = trained_model();
    let dir = tempfile::TempDir::new()?;
    model.save_dir(dir.path())?;

    // Replace classes.json with the labels of another run
    let classes_path = dir.path().join("classes.json");
    let mut classes: serde_json::Value = serde_json::from_slice(&std::fs::read(&classes_path)?)?;
    classes["run_id"] = serde_json::Value::String(uuid::Uuid::new_v4().to_string());
    std::fs::write(&classes_path, serde_json::to_vec(&classes)?)?;

    let result = TrainedModel::load_dir(dir.path());
    assert!(matches!(result, Err(RecognitionError::MismatchedArtifact(_))));
    Ok(())
}

#[test]
fn test_missing_member_is_rejected() -> anyhow::Result<()> {
    let (model, _) = trained_model();
    let dir = tempfile::TempDir::new()?;
    model.save_dir(dir.path())?;
    std::fs::remove_file(dir.path().join("scaler.json"))?;

    let result = TrainedModel::load_dir(dir.path());
    assert!(matches!(result, Err(RecognitionError::MismatchedArtifact(_))));
    Ok(())
}

#[test]
fn test_forest_rejects_empty_input() {
    let records = ndarray::Array2::<f64>::zeros((0, 4));
    let result = RandomForest::fit(records.view(), &[], 2, &small_forest_config());
    assert!(matches!(result, Err(RecognitionError::Training(_))));
}

#[test]
fn test_train_from_image_dataset() -> anyhow::Result<()> {
    let dataset = create_test_dataset(&[("Apple", RED), ("Blueberry", BLUE)], 6);
    // Undecodable file is skipped, not fatal
    std::fs::write(dataset.path().join("Apple").join("broken.jpg"), b"garbage")?;

    let index = DatasetIndex::scan(dataset.path())?;
    assert_eq!(index.labels(), vec!["Apple".to_string(), "Blueberry".to_string()]);
    assert_eq!(index.image_count(), 13);

    let (model, report) = forest::train_from_dataset(&index, FeatureLayout::default(), &small_forest_config())?;
    assert_eq!(report.train_samples + report.test_samples, 12);
    assert_eq!(report.train_accuracy, 1.0);

    let classifier = ForestClassifier::new(
        Arc::new(model),
        DecisionPolicy {
            confidence_threshold: 50.0,
        },
    );
    assert!(classifier.is_ready());
    assert_eq!(classifier.class_count(), 2);

    let prediction = classifier.classify(&noisy_image(48, BLUE, 12, 4242))?;
    assert_eq!(prediction.label, "Blueberry");
    assert!(prediction.is_accepted());
    Ok(())
}

#[test]
fn test_missing_dataset_is_an_error() {
    let result = DatasetIndex::scan("/nonexistent/fruit_dataset");
    assert!(matches!(result, Err(RecognitionError::Dataset(_))));
}

#[test]
fn test_scaler_uses_training_rows_only() {
    let (features, targets) = separable_features(20);
    let config = small_forest_config();
    let (model, _) = forest::train(
        &features,
        &targets,
        vec!["Apple".to_string(), "Banana".to_string()],
        FeatureLayout::default(),
        &config,
    )
    .expect("Failed to train model");

    let split = stratified_split(&targets, config.test_ratio, config.seed);
    let column_mean = |rows: &[usize], column: usize| {
        rows.iter().map(|&r| features[r].as_slice()[column]).sum::<f64>() / rows.len() as f64
    };
    let all_rows: Vec<usize> = (0..features.len()).collect();

    let dim = FeatureLayout::default().len();
    for column in 0..dim {
        let expected = column_mean(&split.train, column);
        assert!(
            (model.scaler.mean[column] - expected).abs() < 1e-9,
            "column {}: {} vs {}",
            column,
            model.scaler.mean[column],
            expected
        );
    }
    assert!(
        (0..dim).any(|c| (model.scaler.mean[c] - column_mean(&all_rows, c)).abs() > 1e-6),
        "scaler statistics should not include test rows"
    );
}

/// Save a model into a fresh directory and rewrite one JSON member
fn saved_with_edit(member: &str, edit: impl FnOnce(&mut serde_json::Value)) -> anyhow::Result<tempfile::TempDir> {
    let (model, _) = trained_model();
    let dir = tempfile::TempDir::new()?;
    model.save_dir(dir.path())?;

    let path = dir.path().join(member);
    let mut value: serde_json::Value = serde_json::from_slice(&std::fs::read(&path)?)?;
    edit(&mut value);
    std::fs::write(&path, serde_json::to_vec(&value)?)?;
    Ok(dir)
}

#[test]
fn test_unknown_layout_version_is_rejected() -> anyhow::Result<()> {
    let dir = saved_with_edit("manifest.json", |manifest| {
        manifest["feature_layout"]["version"] = serde_json::json!(2);
    })?;
    let result = TrainedModel::load_dir(dir.path());
    assert!(matches!(result, Err(RecognitionError::MismatchedArtifact(_))));
    Ok(())
}

#[test]
fn test_wrong_class_count_is_rejected() -> anyhow::Result<()> {
    let dir = saved_with_edit("manifest.json", |manifest| {
        manifest["class_count"] = serde_json::json!(3);
    })?;
    let result = TrainedModel::load_dir(dir.path());
    assert!(matches!(result, Err(RecognitionError::MismatchedArtifact(_))));
    Ok(())
}

#[test]
fn test_wrong_scaler_dimension_is_rejected() -> anyhow::Result<()> {
    let dir = saved_with_edit("scaler.json", |scaler| {
        scaler["scaler"]["mean"] = serde_json::json!(vec![0.0; 10]);
        scaler["scaler"]["scale"] = serde_json::json!(vec![1.0; 10]);
    })?;
    let result = TrainedModel::load_dir(dir.path());
    assert!(matches!(result, Err(RecognitionError::MismatchedArtifact(_))));
    Ok(())
}

#[test]
fn test_missing_bundle_is_not_loaded() {
    let classifier = ForestClassifier::lazy("/nonexistent/fruit.model", DecisionPolicy::default());

    let result = classifier.classify(&solid_image(10, 10, RED));
    assert!(matches!(result, Err(RecognitionError::NotLoaded(_))));
    assert!(!classifier.is_ready());
    assert!(classifier.labels().is_empty());
}

#[test]
fn test_invalid_forest_config_is_rejected() {
    let (features, targets) = separable_features(5);
    let labels = vec!["Apple".to_string(), "Banana".to_string()];

    let bad_configs = [
        ForestConfig {
            n_trees: 0,
            ..ForestConfig::default()
        },
        ForestConfig {
            test_ratio: 1.0,
            ..ForestConfig::default()
        },
        ForestConfig {
            test_ratio: -0.1,
            ..ForestConfig::default()
        },
        ForestConfig {
            max_features: MaxFeatures::Fraction(0.0),
            ..ForestConfig::default()
        },
    ];
    for config in &bad_configs {
        let result = forest::train(&features, &targets, labels.clone(), FeatureLayout::default(), config);
        assert!(matches!(result, Err(RecognitionError::InvalidConfig(_))), "{:?}", config);
    }

    let no_bins = FeatureLayout {
        histogram_bins: 0,
        ..FeatureLayout::default()
    };
    let result = forest::train(&features, &targets, labels, no_bins, &small_forest_config());
    assert!(matches!(result, Err(RecognitionError::InvalidConfig(_))));
}

#[test]
fn test_invalid_layout_fails_before_extraction() {
    let dataset = create_test_dataset(&[("Apple", RED), ("Banana", YELLOW)], 2);
    let index = DatasetIndex::scan(dataset.path()).expect("Failed to scan dataset");
    let tiny = FeatureLayout {
        image_size: 0,
        ..FeatureLayout::default()
    };

    let result = forest::train_from_dataset(&index, tiny, &small_forest_config());
    assert!(matches!(result, Err(RecognitionError::InvalidConfig(_))));
}

#[test]
fn test_default_subspace_is_half_the_features() {
    let config = ForestConfig::default();
    assert_eq!(config.max_features, MaxFeatures::Fraction(0.5));
    assert_eq!(config.max_features.resolve(FeatureLayout::default().len()), 54);
    assert!(config.validate().is_ok());
}
