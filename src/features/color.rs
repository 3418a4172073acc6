use image::RgbImage;

/// Per-channel histograms over `0..=255` with `bins` equal-width bins, R then G then B.
/// Each channel is normalised to sum to 1 on its own.
pub fn channel_histograms(img: &RgbImage, bins: usize) -> Vec<f64> {
    let mut counts = vec![0u64; 3 * bins];
    for pixel in img.pixels() {
        for channel in 0..3 {
            let bin = pixel[channel] as usize * bins / 256;
            counts[channel * bins + bin] += 1;
        }
    }

    let total = (img.width() as u64 * img.height() as u64) as f64;
    counts
        .into_iter()
        .map(|c| if total > 0.0 { c as f64 / total } else { 0.0 })
        .collect()
}

/// Mean and population standard deviation per channel:
/// `[mean_r, std_r, mean_g, std_g, mean_b, std_b]`
pub fn channel_stats(img: &RgbImage) -> [f64; 6] {
    let mut sum = [0.0f64; 3];
    let mut sum_sq = [0.0f64; 3];
    for pixel in img.pixels() {
        for channel in 0..3 {
            let v = pixel[channel] as f64;
            sum[channel] += v;
            sum_sq[channel] += v * v;
        }
    }

    let n = (img.width() as u64 * img.height() as u64) as f64;
    let mut stats = [0.0f64; 6];
    if n == 0.0 {
        return stats;
    }
    for channel in 0..3 {
        let mean = sum[channel] / n;
        let variance = (sum_sq[channel] / n - mean * mean).max(0.0);
        stats[channel * 2] = mean;
        stats[channel * 2 + 1] = variance.sqrt();
    }
    stats
}
