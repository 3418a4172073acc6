use std::path::Path;

use fruitscan::{FeatureLayout, FeatureVector, ForestConfig, forest::MaxFeatures};
use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

/// Color constants for tests
pub const RED: [u8; 3] = [255, 0, 0];
pub const YELLOW: [u8; 3] = [255, 255, 0];
pub const BLUE: [u8; 3] = [0, 0, 255];
pub const GREEN: [u8; 3] = [0, 200, 0];

/// Creates a single-colour image
pub fn solid_image(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |_, _| Rgb(color)))
}

/// Creates an image of `color` where every channel is shifted by up to `jitter`.
/// The same seed always gives the same image.
pub fn noisy_image(size: u32, color: [u8; 3], jitter: i16, seed: u64) -> DynamicImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let img: RgbImage = ImageBuffer::from_fn(size, size, |_, _| {
        let mut px = [0u8; 3];
        for (out, &c) in px.iter_mut().zip(&color) {
            let v = c as i16 + rng.gen_range(-jitter..=jitter);
            *out = v.clamp(0, 255) as u8;
        }
        Rgb(px)
    });
    DynamicImage::ImageRgb8(img)
}

/// Creates a white filled circle centred on a black square
pub fn circle_image(size: u32, radius: i32) -> DynamicImage {
    let mut img = RgbImage::new(size, size);
    let centre = (size as i32 / 2, size as i32 / 2);
    draw_filled_circle_mut(&mut img, centre, radius, Rgb([255, 255, 255]));
    DynamicImage::ImageRgb8(img)
}

/// Encodes an image as PNG bytes
pub fn png_bytes(img: &DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("Failed to encode test image");
    bytes
}

/// Writes `count` noisy images per class into `<root>/<label>/<label>_<n>.png`
pub fn write_class_dir(root: &Path, label: &str, color: [u8; 3], count: usize, seed: u64) {
    let dir = root.join(label);
    std::fs::create_dir_all(&dir).expect("Failed to create class directory");
    for n in 0..count {
        let img = noisy_image(48, color, 12, seed + n as u64);
        img.save(dir.join(format!("{}_{}.png", label.replace(' ', "_"), n)))
            .expect("Failed to save test image");
    }
}

/// Creates a dataset directory with one folder per `(label, colour)` pair.
/// Returns the temp directory, which must be kept alive.
pub fn create_test_dataset(classes: &[(&str, [u8; 3])], per_class: usize) -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp directory");
    for (i, (label, color)) in classes.iter().enumerate() {
        write_class_dir(dir.path(), label, *color, per_class, 1000 * (i as u64 + 1));
    }
    dir
}

/// Two clearly separated clusters of synthetic feature vectors
pub fn separable_features(per_class: usize) -> (Vec<FeatureVector>, Vec<usize>) {
    let dim = FeatureLayout::default().len();
    let mut rng = StdRng::seed_from_u64(7);
    let mut features = Vec::new();
    let mut targets = Vec::new();
    for class in 0..2usize {
        let centre = class as f64 * 10.0;
        for _ in 0..per_class {
            let values = (0..dim).map(|_| centre + rng.gen_range(-1.0..1.0)).collect();
            features.push(FeatureVector::new(values));
            targets.push(class);
        }
    }
    (features, targets)
}

/// Small forest that trains quickly in tests
pub fn small_forest_config() -> ForestConfig {
    ForestConfig {
        n_trees: 15,
        max_features: MaxFeatures::All,
        min_samples_split: 2,
        min_samples_leaf: 1,
        ..ForestConfig::default()
    }
}

/// Horizontal gradient in the red channel plus a vertical one in green, shifted by `offset`
pub fn gradient_image(size: u32, base: [u8; 3], offset: u8) -> DynamicImage {
    let img: RgbImage = ImageBuffer::from_fn(size, size, |x, y| {
        let r = (base[0] as u32 + x / 2 + offset as u32).min(255) as u8;
        let g = (base[1] as u32 + y / 4).min(255) as u8;
        Rgb([r, g, base[2]])
    });
    DynamicImage::ImageRgb8(img)
}
