//! Privacam - Configuration
//!
//! Persisted as JSON. Missing fields take their defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::copy_name::DEFAULT_COPY_ATTEMPTS;
use crate::detect::HeuristicConfig;
use crate::error::{PrivacamError, PrivacamResult};

/// Config file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "privacam.json";

/// Which face detection backend to wire in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// Built-in, no model files
    Heuristic,
    /// External landmark engine
    Ml,
}

/// Privacam configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacamConfig {
    /// Application cache directory; the share root lives below it
    pub cache_dir: PathBuf,
    /// Detection backend
    pub detector: DetectorKind,
    /// Heuristic backend tuning
    pub heuristic: HeuristicConfig,
    /// Give up on the ML engine after this long (0 = wait forever)
    pub ml_timeout_ms: u64,
    /// Extra margin around faces, as a fraction of the face size
    pub redaction_padding: f32,
    /// Zero file contents before deleting shared copies
    pub scrub_share_files: bool,
    /// Listing/create rounds when naming a copy
    pub copy_name_attempts: u32,
}

impl Default for PrivacamConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            detector: DetectorKind::Heuristic,
            heuristic: HeuristicConfig::default(),
            ml_timeout_ms: 10_000,
            redaction_padding: 0.15,
            scrub_share_files: true,
            copy_name_attempts: DEFAULT_COPY_ATTEMPTS,
        }
    }
}

/// Platform cache directory, falling back to the temp dir
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("privacam")
}

/// Platform config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("privacam").join(CONFIG_FILE_NAME))
}

impl PrivacamConfig {
    /// Load from a JSON file
    pub fn load(path: &Path) -> PrivacamResult<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Load if the file exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> PrivacamResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save as pretty JSON
    pub fn save(&self, path: &Path) -> PrivacamResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> PrivacamResult<()> {
        if !(0.0..=1.0).contains(&self.redaction_padding) {
            return Err(PrivacamError::Config(format!(
                "redaction_padding must be within 0..=1, got {}",
                self.redaction_padding
            )));
        }
        if self.copy_name_attempts == 0 {
            return Err(PrivacamError::Config("copy_name_attempts must be at least 1".into()));
        }
        if self.heuristic.min_aspect > self.heuristic.max_aspect {
            return Err(PrivacamError::Config("heuristic.min_aspect exceeds max_aspect".into()));
        }
        Ok(())
    }

    pub fn ml_timeout(&self) -> Option<Duration> {
        (self.ml_timeout_ms > 0).then(|| Duration::from_millis(self.ml_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conf").join(CONFIG_FILE_NAME);

        let config = PrivacamConfig {
            cache_dir: dir.path().join("cache"),
            detector: DetectorKind::Ml,
            ml_timeout_ms: 250,
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = PrivacamConfig::load(&path).unwrap();
        assert_eq!(loaded.cache_dir, dir.path().join("cache"));
        assert_eq!(loaded.detector, DetectorKind::Ml);
        assert_eq!(loaded.ml_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{ "detector": "heuristic", "ml_timeout_ms": 0 }"#).unwrap();

        let loaded = PrivacamConfig::load(&path).unwrap();
        assert_eq!(loaded.ml_timeout(), None);
        assert_eq!(loaded.copy_name_attempts, DEFAULT_COPY_ATTEMPTS);
        assert_eq!(loaded.heuristic.analysis_size, 320);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let loaded = PrivacamConfig::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded.detector, DetectorKind::Heuristic);
    }

    #[test]
    fn test_invalid_padding_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{ "redaction_padding": 3.0 }"#).unwrap();

        assert!(matches!(PrivacamConfig::load(&path), Err(PrivacamError::Config(_))));
    }
}
