use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma, RgbImage};
use imageproc::edges::canny;

/// Convert to RGB and resize to a `size`×`size` square
pub fn resize_rgb(img: &DynamicImage, size: u32) -> RgbImage {
    let rgb = img.to_rgb8();
    if rgb.dimensions() == (size, size) {
        return rgb;
    }
    image::imageops::resize(&rgb, size, size, FilterType::Triangle)
}

/// Convert image to grayscale
pub fn to_grayscale(img: &RgbImage) -> GrayImage {
    DynamicImage::ImageRgb8(img.clone()).to_luma8()
}

/// Detect edges using Canny edge detector
pub fn detect_edges(img: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    canny(img, low_threshold, high_threshold)
}

/// Pixels brighter than `threshold` become foreground (255), the rest background (0)
pub fn binarize(img: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        if img.get_pixel(x, y)[0] > threshold {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}
