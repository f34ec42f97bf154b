//! Privacam - Redaction Regions
//!
//! Geometry only. How a region is obscured is up to the renderer.

use crate::detect::{FoundFace, Rect};

/// Face boxes grown by `padding` (fraction of each side) and clamped to the
/// image. Boxes entirely outside the image are dropped.
pub fn redaction_regions(faces: &[FoundFace], width: u32, height: u32, padding: f32) -> Vec<Rect> {
    let padding = padding.max(0.0);

    faces
        .iter()
        .map(|face| {
            let b = face.bounding_box;
            let dx = (b.width() as f32 * padding).round() as i32;
            let dy = (b.height() as f32 * padding).round() as i32;

            Rect::new(
                (b.left - dx).max(0),
                (b.top - dy).max(0),
                (b.right + dx).min(width as i32),
                (b.bottom + dy).min(height as i32),
            )
        })
        .filter(|r| !r.is_empty())
        .collect()
}

/// Share of the image covered by regions (overlaps counted twice)
pub fn coverage(regions: &[Rect], width: u32, height: u32) -> f32 {
    let total = width as f32 * height as f32;
    if total == 0.0 {
        return 0.0;
    }

    let covered: f32 = regions
        .iter()
        .map(|r| r.width() as f32 * r.height() as f32)
        .sum();
    covered / total
}
