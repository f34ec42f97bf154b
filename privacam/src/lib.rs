//! # Privacam
//!
//! Face-aware export pipeline for a private camera.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      PRIVACAM API                        │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────┐  │
//! │  │  IDENTITY   │  │  COPY NAMER │  │  FACE DETECTOR  │  │
//! │  │  name→time  │  │  _cp, _cpN  │  │  heuristic | ML │  │
//! │  └─────────────┘  └──────┬──────┘  └────────┬────────┘  │
//! │                          │                  │           │
//! │  ┌───────────────────────┴──────┐  ┌────────┴────────┐  │
//! │  │        SHARE CACHE           │  │   REDACTION     │  │
//! │  │  share/<session>/, purge     │  │   REGIONS       │  │
//! │  └──────────────────────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Capture time never fails to resolve; unreadable names report "now"
//! - Copy names never overwrite; listing failures are surfaced
//! - Detection never fails the caller; broken backends find zero faces
//! - Cancelled detections never deliver a result
//! - Shared copies live only under the share root and are purged in bulk

pub mod api;
pub mod config;
pub mod copy_name;
pub mod detect;
pub mod error;
pub mod identity;
pub mod redact;
pub mod share_cache;

pub use api::{FaceAnalysis, PrivacamApi, StagedPhoto};
pub use config::{DetectorKind, PrivacamConfig};
pub use copy_name::{generate_copy_name, DirectoryListing, LocalDirectory};
pub use detect::{Eyes, FaceDetector, FoundFace, HeuristicFaceDetector, MlFaceDetector, Point, Rect};
pub use error::{PrivacamError, PrivacamResult};
pub use identity::PhotoIdentity;
pub use share_cache::{ClearReport, ShareCacheManager, ShareSession};

/// Privacam version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
