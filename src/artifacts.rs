//! Model bundle: one `tar.zst` archive holding the scaler, the forest and the label
//! list of a single training run.
//!
//! ```text
//! manifest.json   format version, run id, feature layout, class count
//! forest.msgpack  run id + fitted trees
//! scaler.json     run id + per-feature mean/scale
//! classes.json    run id + labels in class index order
//! ```
//!
//! Every member carries the run id of the training run that produced it. Loading
//! fails with [`RecognitionError::MismatchedArtifact`] unless all ids and dimensions agree.

use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tar::{Archive, Builder};
use tempdir::TempDir;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info};
use uuid::Uuid;
use zstd::stream::{read::Decoder as ZstdDecoder, write::Encoder as ZstdEncoder};

use crate::error::{RecognitionError, Result};
use crate::features::{FEATURE_LAYOUT_VERSION, FeatureLayout};
use crate::forest::{RandomForest, StandardScaler, TrainedModel};

pub const BUNDLE_FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "manifest.json";
const FOREST_FILE: &str = "forest.msgpack";
const SCALER_FILE: &str = "scaler.json";
const CLASSES_FILE: &str = "classes.json";

/// Description of a bundle, written next to the artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub run_id: Uuid,
    pub created_at: String,
    pub feature_layout: FeatureLayout,
    pub feature_len: usize,
    pub class_count: usize,
}

#[derive(Serialize)]
struct ForestArtifactRef<'a> {
    run_id: Uuid,
    forest: &'a RandomForest,
}

#[derive(Deserialize)]
struct ForestArtifact {
    run_id: Uuid,
    forest: RandomForest,
}

#[derive(Serialize, Deserialize)]
struct ScalerArtifact {
    run_id: Uuid,
    scaler: StandardScaler,
}

#[derive(Serialize, Deserialize)]
struct ClassesArtifact {
    run_id: Uuid,
    labels: Vec<String>,
}

impl TrainedModel {
    /// Write the bundle members into `dir`
    pub fn save_dir(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let created_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|e| RecognitionError::Serialization(e.to_string()))?;
        let manifest = Manifest {
            format_version: BUNDLE_FORMAT_VERSION,
            run_id: self.run_id,
            created_at,
            feature_layout: self.layout.clone(),
            feature_len: self.layout.len(),
            class_count: self.labels.len(),
        };
        fs::write(dir.join(MANIFEST_FILE), serde_json::to_vec_pretty(&manifest)?)?;

        let forest = rmp_serde::to_vec(&ForestArtifactRef {
            run_id: self.run_id,
            forest: &self.forest,
        })
        .map_err(|e| RecognitionError::Serialization(format!("forest: {}", e)))?;
        fs::write(dir.join(FOREST_FILE), forest)?;

        let scaler = ScalerArtifact {
            run_id: self.run_id,
            scaler: self.scaler.clone(),
        };
        fs::write(dir.join(SCALER_FILE), serde_json::to_vec_pretty(&scaler)?)?;

        let classes = ClassesArtifact {
            run_id: self.run_id,
            labels: self.labels.clone(),
        };
        fs::write(dir.join(CLASSES_FILE), serde_json::to_vec_pretty(&classes)?)?;

        debug!(dir = %dir.display(), run_id = %self.run_id, "wrote model artifacts");
        Ok(())
    }

    /// Read and cross-check the bundle members in `dir`
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();

        let manifest: Manifest = serde_json::from_slice(&read_member(dir, MANIFEST_FILE)?)?;
        if manifest.format_version != BUNDLE_FORMAT_VERSION {
            return Err(RecognitionError::MismatchedArtifact(format!(
                "unsupported bundle format version {}",
                manifest.format_version
            )));
        }
        if manifest.feature_layout.version != FEATURE_LAYOUT_VERSION {
            return Err(RecognitionError::MismatchedArtifact(format!(
                "model was trained with feature layout version {}, this build extracts version {}",
                manifest.feature_layout.version, FEATURE_LAYOUT_VERSION
            )));
        }

        let forest: ForestArtifact = rmp_serde::from_slice(&read_member(dir, FOREST_FILE)?)
            .map_err(|e| RecognitionError::Serialization(format!("forest: {}", e)))?;
        let scaler: ScalerArtifact = serde_json::from_slice(&read_member(dir, SCALER_FILE)?)?;
        let classes: ClassesArtifact = serde_json::from_slice(&read_member(dir, CLASSES_FILE)?)?;

        for (member, run_id) in [
            (FOREST_FILE, forest.run_id),
            (SCALER_FILE, scaler.run_id),
            (CLASSES_FILE, classes.run_id),
        ] {
            if run_id != manifest.run_id {
                return Err(RecognitionError::MismatchedArtifact(format!(
                    "{} belongs to run {}, manifest is for run {}",
                    member, run_id, manifest.run_id
                )));
            }
        }

        let feature_len = manifest.feature_layout.len();
        check_dim("manifest feature length", manifest.feature_len, feature_len)?;
        check_dim("scaler dimension", scaler.scaler.dim(), feature_len)?;
        check_dim("forest feature count", forest.forest.n_features(), feature_len)?;
        check_dim("label count", classes.labels.len(), manifest.class_count)?;
        check_dim("forest class count", forest.forest.n_classes(), classes.labels.len())?;

        Ok(TrainedModel {
            run_id: manifest.run_id,
            layout: manifest.feature_layout,
            scaler: scaler.scaler,
            forest: forest.forest,
            labels: classes.labels,
        })
    }

    /// Write the bundle as a `tar.zst` archive at `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let staging = TempDir::new("fruitscan_bundle")?;
        self.save_dir(staging.path())?;

        let out = File::create(path)?;
        let encoder = ZstdEncoder::new(out, 3)?;
        let mut tar = Builder::new(encoder);
        tar.append_dir_all(".", staging.path())?;
        let encoder = tar.into_inner()?;
        encoder.finish()?;

        info!(path = %path.display(), run_id = %self.run_id, "saved model bundle");
        Ok(())
    }

    /// Load a bundle written by [`TrainedModel::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let working_dir = TempDir::new("fruitscan_bundle")?;

        let f = File::open(path)?;
        let decoder = ZstdDecoder::new(f)?;
        let mut archive = Archive::new(decoder);
        archive.unpack(working_dir.path())?;

        let model = Self::load_dir(working_dir.path())?;
        info!(
            path = %path.display(),
            run_id = %model.run_id,
            classes = model.labels.len(),
            "loaded model bundle"
        );
        Ok(model)
    }
}

fn read_member(dir: &Path, name: &str) -> Result<Vec<u8>> {
    fs::read(dir.join(name)).map_err(|e| match e.kind() {
        ErrorKind::NotFound => RecognitionError::MismatchedArtifact(format!("bundle is missing {}", name)),
        _ => RecognitionError::Io(e),
    })
}

fn check_dim(what: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(RecognitionError::MismatchedArtifact(format!(
            "{} is {}, expected {}",
            what, actual, expected
        )));
    }
    Ok(())
}
