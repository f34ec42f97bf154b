//! ML-engine backed detector.
//!
//! The engine itself is an external collaborator reporting through
//! callbacks; this module converts images into engine frames, bridges the
//! callbacks into a cancellable future and maps landmarks onto [`FoundFace`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::bridge::{self, BridgeError, Completion, PendingRequest};
use super::{FaceDetector, FoundFace, Point, Rect};

/// Engine-reported failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct EngineError(pub String);

/// Completion handle engines report through
pub type EngineCompletion = Completion<Vec<EngineFace>, EngineError>;

/// RGBA8 frame handed to the engine
#[derive(Debug, Clone)]
pub struct EngineFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl EngineFrame {
    pub fn from_image(image: &DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        Self {
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LandmarkKind {
    LeftEye,
    RightEye,
    NoseBase,
    MouthLeft,
    MouthRight,
    MouthBottom,
    LeftEar,
    RightEar,
    LeftCheek,
    RightCheek,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub kind: LandmarkKind,
    pub position: Point,
}

/// One face as the engine reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineFace {
    pub bounds: Rect,
    pub landmarks: Vec<Landmark>,
}

impl EngineFace {
    fn landmark(&self, kind: LandmarkKind) -> Option<Point> {
        self.landmarks
            .iter()
            .find(|l| l.kind == kind)
            .map(|l| l.position)
    }

    /// `None` when the engine produced a degenerate box
    fn into_found_face(self) -> Option<FoundFace> {
        if self.bounds.is_empty() {
            return None;
        }

        let left = self.landmark(LandmarkKind::LeftEye);
        let right = self.landmark(LandmarkKind::RightEye);
        Some(FoundFace::new(self.bounds, left, right))
    }
}

/// Callback-style face/landmark engine
pub trait LandmarkEngine: Send + Sync {
    fn name(&self) -> &str {
        "landmark-engine"
    }

    /// Start detection on `frame`. The engine reports exactly once through
    /// `completion` (from any thread) and returns a handle that releases
    /// the request if the caller loses interest.
    fn submit(&self, frame: EngineFrame, completion: EngineCompletion) -> Box<dyn PendingRequest>;
}

/// [`FaceDetector`] over a [`LandmarkEngine`]
pub struct MlFaceDetector {
    engine: Arc<dyn LandmarkEngine>,
    timeout: Option<Duration>,
}

impl MlFaceDetector {
    pub fn new(engine: Arc<dyn LandmarkEngine>, timeout: Option<Duration>) -> Self {
        Self { engine, timeout }
    }
}

#[async_trait]
impl FaceDetector for MlFaceDetector {
    fn name(&self) -> &'static str {
        "ml"
    }

    async fn process_for_faces(&self, image: &DynamicImage) -> Vec<FoundFace> {
        let frame = EngineFrame::from_image(image);
        let engine = Arc::clone(&self.engine);
        let request = bridge::await_completion(move |done| engine.submit(frame, done));

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, request).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    log::warn!("{} timed out after {:?}", self.engine.name(), limit);
                    return Vec::new();
                }
            },
            None => request.await,
        };

        match outcome {
            Ok(faces) => {
                let found: Vec<FoundFace> = faces
                    .into_iter()
                    .filter_map(EngineFace::into_found_face)
                    .collect();
                log::debug!("{} found {} face(s)", self.engine.name(), found.len());
                found
            }
            Err(BridgeError::Engine(e)) => {
                log::warn!("Face detection failed in {}: {}", self.engine.name(), e);
                Vec::new()
            }
            Err(BridgeError::Dropped) => {
                log::warn!("{} dropped the request without a result", self.engine.name());
                Vec::new()
            }
        }
    }
}
