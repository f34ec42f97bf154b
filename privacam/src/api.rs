//! Privacam - Unified Public API
//!
//! Single entry point tying photo identity, copy naming, face detection and
//! the share cache together. The detector backend is resolved once here.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use image::{DynamicImage, GenericImageView};
use serde::Serialize;

use crate::config::PrivacamConfig;
use crate::copy_name::{self, LocalDirectory};
use crate::detect::{build_detector, FaceDetector, FoundFace, LandmarkEngine, Rect};
use crate::error::PrivacamResult;
use crate::identity::PhotoIdentity;
use crate::redact::{coverage, redaction_regions};
use crate::share_cache::{ShareCacheManager, ShareSession};

/// Faces found in a photo plus the regions to obscure
#[derive(Debug, Clone, Serialize)]
pub struct FaceAnalysis {
    pub width: u32,
    pub height: u32,
    pub faces: Vec<FoundFace>,
    pub regions: Vec<Rect>,
    /// Fraction of the image the regions cover
    pub coverage: f32,
}

/// A copy staged for sharing
#[derive(Debug, Clone, Serialize)]
pub struct StagedPhoto {
    pub path: PathBuf,
    pub date_taken: DateTime<Local>,
}

/// Privacam API
///
/// # Example
///
/// ```rust,ignore
/// let api = PrivacamApi::open(PrivacamConfig::default(), None)?;
///
/// let analysis = api.analyze_photo(&jpeg_bytes).await?;
/// // render analysis.regions into the bytes here
///
/// let session = api.begin_share()?;
/// let staged = api.stage_for_share(&session, &identity, &redacted_bytes)?;
/// // hand staged.path to the share target, then
/// session.close();
/// ```
pub struct PrivacamApi {
    config: PrivacamConfig,
    detector: Arc<dyn FaceDetector>,
    share: Arc<ShareCacheManager>,
}

impl PrivacamApi {
    /// Wire up from configuration. `engine` is required when the ML
    /// detector is configured and ignored otherwise.
    pub fn open(config: PrivacamConfig, engine: Option<Arc<dyn LandmarkEngine>>) -> PrivacamResult<Self> {
        config.validate()?;
        let detector = build_detector(&config, engine)?;
        Ok(Self::with_detector(config, detector))
    }

    /// Wire up with an already built detector
    pub fn with_detector(config: PrivacamConfig, detector: Arc<dyn FaceDetector>) -> Self {
        let share = Arc::new(ShareCacheManager::from_config(&config));
        Self {
            config,
            detector,
            share,
        }
    }

    pub fn config(&self) -> &PrivacamConfig {
        &self.config
    }

    pub fn share_cache(&self) -> &Arc<ShareCacheManager> {
        &self.share
    }

    // ═══════════════════════════════════════════════════════════════════════
    // IDENTITY & NAMING
    // ═══════════════════════════════════════════════════════════════════════

    /// Capture time of a stored photo
    pub fn date_taken(&self, identity: &PhotoIdentity) -> DateTime<Local> {
        identity.date_taken()
    }

    /// Preferred copy name for `original` inside `dir`
    pub fn generate_copy_name(&self, dir: &Path, original: &str) -> PrivacamResult<String> {
        copy_name::generate_copy_name(&LocalDirectory::new(dir), original)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // DETECTION
    // ═══════════════════════════════════════════════════════════════════════

    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }

    pub async fn process_for_faces(&self, image: &DynamicImage) -> Vec<FoundFace> {
        self.detector.process_for_faces(image).await
    }

    /// Decode, detect and compute redaction regions
    pub async fn analyze_photo(&self, data: &[u8]) -> PrivacamResult<FaceAnalysis> {
        let image = image::load_from_memory(data)?;
        self.analyze_image(&image).await
    }

    pub async fn analyze_image(&self, image: &DynamicImage) -> PrivacamResult<FaceAnalysis> {
        let (width, height) = image.dimensions();
        let faces = self.detector.process_for_faces(image).await;
        let regions = redaction_regions(&faces, width, height, self.config.redaction_padding);
        let coverage = coverage(&regions, width, height);

        Ok(FaceAnalysis {
            width,
            height,
            faces,
            regions,
            coverage,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SHARE CACHE
    // ═══════════════════════════════════════════════════════════════════════

    pub fn begin_share(&self) -> PrivacamResult<ShareSession> {
        self.share.begin_session()
    }

    /// Stage an exported copy under the photo's stored name
    pub fn stage_for_share(
        &self,
        session: &ShareSession,
        identity: &PhotoIdentity,
        data: &[u8],
    ) -> PrivacamResult<StagedPhoto> {
        let path = session.stage(&identity.file_name(), data)?;
        Ok(StagedPhoto {
            path,
            date_taken: identity.date_taken(),
        })
    }

    /// Clear the whole share root on the blocking pool
    pub async fn clear_share_directory(&self) -> bool {
        let share = Arc::clone(&self.share);
        match tokio::task::spawn_blocking(move || share.clear_share_directory()).await {
            Ok(cleared) => cleared,
            Err(e) => {
                log::warn!("Share cache clear did not finish: {}", e);
                false
            }
        }
    }

    pub fn clear_share_directory_blocking(&self) -> bool {
        self.share.clear_share_directory()
    }
}
