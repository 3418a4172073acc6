use image::GrayImage;
use imageproc::contours::find_contours as trace_borders;

use crate::models::Contour;

/// Trace every border (outer borders and holes) of the non-zero regions
pub fn find_contours(binary: &GrayImage) -> Vec<Contour> {
    trace_borders::<i32>(binary)
        .into_iter()
        .filter_map(|c| Contour::from_points(c.points.into_iter().map(|p| (p.x, p.y)).collect()))
        .collect()
}

/// Contour enclosing the largest area; the first one wins on equal areas
pub fn largest_contour(contours: &[Contour]) -> Option<&Contour> {
    let mut best: Option<(&Contour, f64)> = None;
    for contour in contours {
        let area = contour.area();
        match best {
            Some((_, best_area)) if area <= best_area => {}
            _ => best = Some((contour, area)),
        }
    }
    best.map(|(contour, _)| contour)
}
