//! Privacam - Error Types

use std::path::PathBuf;
use thiserror::Error;

/// Result type for privacam operations
pub type PrivacamResult<T> = Result<T, PrivacamError>;

/// Privacam error types
#[derive(Error, Debug)]
pub enum PrivacamError {
    // ═══════════════════════════════════════════════════════════════
    // FILE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cannot list directory {path}: {source}")]
    DirectoryListing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No free copy name for {name} after {attempts} attempts")]
    CopyNameExhausted { name: String, attempts: u32 },

    // ═══════════════════════════════════════════════════════════════
    // SHARE CACHE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Share session error: {0}")]
    ShareSession(String),

    // ═══════════════════════════════════════════════════════════════
    // DETECTION ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Image processing error: {0}")]
    ImageError(String),

    #[error("Face detector unavailable: {0}")]
    DetectorUnavailable(String),

    // ═══════════════════════════════════════════════════════════════
    // CONFIG / SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

impl PrivacamError {
    /// Errors that put a written file at risk of collision or overwrite
    pub fn threatens_integrity(&self) -> bool {
        matches!(
            self,
            PrivacamError::DirectoryListing { .. } | PrivacamError::CopyNameExhausted { .. }
        )
    }
}

impl From<serde_json::Error> for PrivacamError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_data() || e.is_syntax() || e.is_eof() {
            PrivacamError::DeserializationError(e.to_string())
        } else {
            PrivacamError::SerializationError(e.to_string())
        }
    }
}

impl From<image::ImageError> for PrivacamError {
    fn from(e: image::ImageError) -> Self {
        PrivacamError::ImageError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_error_threatens_integrity() {
        let err = PrivacamError::DirectoryListing {
            path: PathBuf::from("/nope"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.threatens_integrity());
        assert!(!PrivacamError::ShareSession("closed".into()).threatens_integrity());
        assert!(err.to_string().contains("/nope"));
    }

    #[test]
    fn test_bad_json_is_deserialization_error() {
        let err: PrivacamError = serde_json::from_str::<u32>("{").unwrap_err().into();
        assert!(matches!(err, PrivacamError::DeserializationError(_)));
    }
}
