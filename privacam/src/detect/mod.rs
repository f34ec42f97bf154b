//! Privacam - Face Detection
//!
//! One async contract, two interchangeable backends. The backend is picked
//! once from configuration; everything else talks to [`FaceDetector`].

pub mod bridge;
pub mod heuristic;
pub mod ml;

use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::config::{DetectorKind, PrivacamConfig};
use crate::error::{PrivacamError, PrivacamResult};

pub use heuristic::{HeuristicConfig, HeuristicFaceDetector};
pub use ml::{EngineFace, EngineFrame, Landmark, LandmarkEngine, LandmarkKind, MlFaceDetector};

/// Axis-aligned box in image pixels. `right`/`bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left as f32
            && point.x < self.right as f32
            && point.y >= self.top as f32
            && point.y < self.bottom as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Both eye positions of a face
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Eyes {
    pub left: Point,
    pub right: Point,
}

impl Eyes {
    /// Only a complete pair makes `Eyes`
    pub fn pair(left: Option<Point>, right: Option<Point>) -> Option<Self> {
        Some(Self {
            left: left?,
            right: right?,
        })
    }
}

/// A detected face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundFace {
    pub bounding_box: Rect,
    pub eyes: Option<Eyes>,
}

impl FoundFace {
    pub fn new(bounding_box: Rect, left_eye: Option<Point>, right_eye: Option<Point>) -> Self {
        Self {
            bounding_box,
            eyes: Eyes::pair(left_eye, right_eye),
        }
    }
}

/// Face detection capability.
///
/// Implementations never fail towards the caller: a broken or unavailable
/// backend yields an empty list, the same as an image without faces.
/// Dropping the returned future cancels the request.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    async fn process_for_faces(&self, image: &DynamicImage) -> Vec<FoundFace>;
}

/// Resolve the configured backend
pub fn build_detector(
    config: &PrivacamConfig,
    engine: Option<Arc<dyn LandmarkEngine>>,
) -> PrivacamResult<Arc<dyn FaceDetector>> {
    let detector: Arc<dyn FaceDetector> = match config.detector {
        DetectorKind::Heuristic => Arc::new(HeuristicFaceDetector::new(config.heuristic.clone())),
        DetectorKind::Ml => {
            let engine = engine.ok_or_else(|| {
                PrivacamError::DetectorUnavailable("ML detector selected but no engine supplied".into())
            })?;
            Arc::new(MlFaceDetector::new(engine, config.ml_timeout()))
        }
    };

    log::info!("Using {} face detector", detector.name());
    Ok(detector)
}
