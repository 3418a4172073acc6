use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{RecognitionError, Result};

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Image files belonging to one class
#[derive(Debug, Clone)]
pub struct ClassEntry {
    pub label: String,
    pub images: Vec<PathBuf>,
}

/// Labelled image directory: one subdirectory per class.
///
/// Labels are the subdirectory names in sorted order and a label's position in that
/// order is its class index.
#[derive(Debug, Clone)]
pub struct DatasetIndex {
    pub root: PathBuf,
    pub classes: Vec<ClassEntry>,
}

impl DatasetIndex {
    pub fn scan(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(RecognitionError::Dataset(format!(
                "dataset not found: {}",
                root.display()
            )));
        }

        let mut class_dirs: Vec<(String, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&root)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                let label = entry.file_name().to_string_lossy().into_owned();
                class_dirs.push((label, path));
            }
        }
        class_dirs.sort_by(|a, b| a.0.cmp(&b.0));

        let mut classes = Vec::with_capacity(class_dirs.len());
        for (label, dir) in class_dirs {
            let images = list_images(&dir)?;
            debug!(class = %label, images = images.len(), "scanned class directory");
            classes.push(ClassEntry { label, images });
        }

        info!(root = %root.display(), classes = classes.len(), "scanned dataset");
        Ok(Self { root, classes })
    }

    pub fn labels(&self) -> Vec<String> {
        self.classes.iter().map(|c| c.label.clone()).collect()
    }

    /// Every image with its class index, class by class
    pub fn samples(&self) -> Vec<(PathBuf, usize)> {
        self.classes
            .iter()
            .enumerate()
            .flat_map(|(index, class)| class.images.iter().map(move |p| (p.clone(), index)))
            .collect()
    }

    pub fn image_count(&self) -> usize {
        self.classes.iter().map(|c| c.images.len()).sum()
    }
}

/// Image files directly inside `dir`, sorted by file name
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_image_file(path))
        .collect();
    images.sort();
    Ok(images)
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
