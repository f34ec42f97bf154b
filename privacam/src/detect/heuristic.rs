//! On-device heuristic detector.
//!
//! No models: skin-tone segmentation in YCbCr on a downsampled grid,
//! connected components filtered by shape, then a dark-blob
//! search for eyes in the upper part of each candidate.

use std::collections::VecDeque;

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use super::{FaceDetector, FoundFace, Point, Rect};

/// Tuning for the heuristic backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    /// Longest side of the analysis grid
    pub analysis_size: u32,
    /// Smallest face side in pixels
    pub min_face_size: u32,
    /// Skin cells / box cells
    pub min_fill_ratio: f32,
    /// Height / width bounds
    pub min_aspect: f32,
    pub max_aspect: f32,
    /// Eye pixels are darker than this fraction of mean skin luma
    pub eye_darkness: f32,
    pub max_faces: usize,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            analysis_size: 320,
            min_face_size: 24,
            min_fill_ratio: 0.45,
            min_aspect: 0.8,
            max_aspect: 2.2,
            eye_darkness: 0.55,
            max_faces: 16,
        }
    }
}

/// Heuristic [`FaceDetector`]
pub struct HeuristicFaceDetector {
    config: HeuristicConfig,
}

impl HeuristicFaceDetector {
    pub fn new(config: HeuristicConfig) -> Self {
        Self { config }
    }
}

impl Default for HeuristicFaceDetector {
    fn default() -> Self {
        Self::new(HeuristicConfig::default())
    }
}

#[async_trait]
impl FaceDetector for HeuristicFaceDetector {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn process_for_faces(&self, image: &DynamicImage) -> Vec<FoundFace> {
        let rgb = image.to_rgb8();
        let config = self.config.clone();

        match tokio::task::spawn_blocking(move || detect_faces(&rgb, &config)).await {
            Ok(faces) => {
                log::debug!("Heuristic detector found {} face(s)", faces.len());
                faces
            }
            Err(e) => {
                log::warn!("Heuristic detection aborted: {}", e);
                Vec::new()
            }
        }
    }
}

fn luma(p: &Rgb<u8>) -> f32 {
    0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32
}

fn is_skin(p: &Rgb<u8>) -> bool {
    let (r, g, b) = (p[0] as f32, p[1] as f32, p[2] as f32);
    let cb = 128.0 - 0.168736 * r - 0.331264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418688 * g - 0.081312 * b;

    luma(p) > 40.0 && (77.0..=127.0).contains(&cb) && (133.0..=173.0).contains(&cr)
}

/// Grid component in cell coordinates
struct Blob {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    cells: u32,
}

/// Run detection synchronously
pub fn detect_faces(image: &RgbImage, config: &HeuristicConfig) -> Vec<FoundFace> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let analysis = config.analysis_size.max(1);
    let step = ((width.max(height) + analysis - 1) / analysis).max(1);
    let grid_w = (width + step - 1) / step;
    let grid_h = (height + step - 1) / step;

    let mask: Vec<bool> = (0..grid_h)
        .flat_map(|gy| (0..grid_w).map(move |gx| (gx, gy)))
        .map(|(gx, gy)| is_skin(image.get_pixel(gx * step, gy * step)))
        .collect();

    let mut faces: Vec<FoundFace> = skin_blobs(&mask, grid_w, grid_h)
        .into_iter()
        .filter_map(|blob| {
            let rect = Rect::new(
                (blob.min_x * step) as i32,
                (blob.min_y * step) as i32,
                ((blob.max_x + 1) * step).min(width) as i32,
                ((blob.max_y + 1) * step).min(height) as i32,
            );

            let box_cells = (blob.max_x - blob.min_x + 1) * (blob.max_y - blob.min_y + 1);
            let fill = blob.cells as f32 / box_cells as f32;
            let aspect = rect.height() as f32 / rect.width() as f32;

            let plausible = rect.width() >= config.min_face_size as i32
                && rect.height() >= config.min_face_size as i32
                && fill >= config.min_fill_ratio
                && (config.min_aspect..=config.max_aspect).contains(&aspect);
            if !plausible {
                return None;
            }

            let (left, right) = locate_eyes(image, rect, config.eye_darkness);
            Some(FoundFace::new(rect, left, right))
        })
        .collect();

    faces.sort_by_key(|f| -(f.bounding_box.width() * f.bounding_box.height()));
    faces.truncate(config.max_faces);
    faces
}

/// 4-connected components of the skin mask
fn skin_blobs(mask: &[bool], grid_w: u32, grid_h: u32) -> Vec<Blob> {
    let mut seen = vec![false; mask.len()];
    let mut blobs = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..mask.len() {
        if !mask[start] || seen[start] {
            continue;
        }

        seen[start] = true;
        queue.push_back(start);
        let mut blob = Blob {
            min_x: u32::MAX,
            min_y: u32::MAX,
            max_x: 0,
            max_y: 0,
            cells: 0,
        };

        while let Some(idx) = queue.pop_front() {
            let x = idx as u32 % grid_w;
            let y = idx as u32 / grid_w;
            blob.min_x = blob.min_x.min(x);
            blob.min_y = blob.min_y.min(y);
            blob.max_x = blob.max_x.max(x);
            blob.max_y = blob.max_y.max(y);
            blob.cells += 1;

            let mut visit = |nx: u32, ny: u32| {
                let n = (ny * grid_w + nx) as usize;
                if mask[n] && !seen[n] {
                    seen[n] = true;
                    queue.push_back(n);
                }
            };
            if x > 0 {
                visit(x - 1, y);
            }
            if x + 1 < grid_w {
                visit(x + 1, y);
            }
            if y > 0 {
                visit(x, y - 1);
            }
            if y + 1 < grid_h {
                visit(x, y + 1);
            }
        }

        blobs.push(blob);
    }

    blobs
}

/// Dark non-skin blobs enclosed by skin in the eye band, one per half
fn locate_eyes(image: &RgbImage, face: Rect, darkness: f32) -> (Option<Point>, Option<Point>) {
    let (left, top, right, bottom) = (
        face.left as u32,
        face.top as u32,
        face.right as u32,
        face.bottom as u32,
    );

    let mut skin_luma = 0.0f64;
    let mut skin_count = 0u64;
    for y in top..bottom {
        for x in left..right {
            let p = image.get_pixel(x, y);
            if is_skin(p) {
                skin_luma += luma(p) as f64;
                skin_count += 1;
            }
        }
    }
    if skin_count == 0 {
        return (None, None);
    }
    let threshold = (skin_luma / skin_count as f64) as f32 * darkness;

    let h = face.height() as u32;
    let band_top = top + h * 15 / 100;
    let band_bottom = top + h * 55 / 100;
    let mid_x = left + face.width() as u32 / 2;

    // (sum_x, sum_y, count) for image-left and image-right halves
    let mut halves = [(0.0f64, 0.0f64, 0u32); 2];

    for y in band_top..band_bottom {
        let skin_xs = (left..right).filter(|&x| is_skin(image.get_pixel(x, y)));
        let (lo, hi) = match skin_xs.fold(None, |span: Option<(u32, u32)>, x| match span {
            None => Some((x, x)),
            Some((lo, _)) => Some((lo, x)),
        }) {
            Some(span) => span,
            None => continue,
        };

        for x in (lo + 1)..hi {
            let p = image.get_pixel(x, y);
            if !is_skin(p) && luma(p) < threshold {
                let half = &mut halves[usize::from(x >= mid_x)];
                half.0 += x as f64 + 0.5;
                half.1 += y as f64 + 0.5;
                half.2 += 1;
            }
        }
    }

    let min_pixels = ((face.width() * face.height()) as u32 / 400).max(2);
    let centroid = |(sx, sy, n): (f64, f64, u32)| {
        (n >= min_pixels).then(|| Point::new((sx / n as f64) as f32, (sy / n as f64) as f32))
    };

    (centroid(halves[0]), centroid(halves[1]))
}
