//! Privacam - Photo Identity
//!
//! Capture metadata lives in the stored filename:
//! `<prefix>_yyyyMMdd_HHmmss_SS.<ext>`. Existing photos were named this way
//! before any database existed, so the name stays the source of truth.

use std::path::{Path, PathBuf};
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

/// Length of `yyyyMMdd_HHmmss_SS`
const STAMP_LEN: usize = 18;

/// Length of `yyyyMMdd_HHmmss`
const SECONDS_LEN: usize = 15;

const SECONDS_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Identity of a stored photo, derived from its filename
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoIdentity {
    /// File name without extension
    pub logical_name: String,
    /// Extension without the dot
    pub format: String,
    /// Backing file
    pub source_path: PathBuf,
}

impl PhotoIdentity {
    pub fn new(logical_name: impl Into<String>, format: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        Self {
            logical_name: logical_name.into(),
            format: format.into(),
            source_path: source_path.into(),
        }
    }

    /// Build an identity from a stored photo's path
    pub fn from_path(path: &Path) -> Self {
        let logical_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let format = path
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self::new(logical_name, format, path)
    }

    /// Identity for a new capture, named with the same encoding `date_taken` reads
    pub fn for_capture(dir: &Path, prefix: &str, taken: DateTime<Local>, format: &str) -> Self {
        let logical_name = encode_capture_name(prefix, taken);
        let source_path = dir.join(format!("{}.{}", logical_name, format));
        Self::new(logical_name, format, source_path)
    }

    /// Stored file name, `logical_name.format`
    pub fn file_name(&self) -> String {
        if self.format.is_empty() {
            self.logical_name.clone()
        } else {
            format!("{}.{}", self.logical_name, self.format)
        }
    }

    /// Capture time encoded in the name.
    ///
    /// Names that don't carry the timestamp report the current time. This is
    /// recomputed on every call and is never an error.
    pub fn date_taken(&self) -> DateTime<Local> {
        parse_capture_time(&self.logical_name).unwrap_or_else(Local::now)
    }
}

/// `<prefix>_yyyyMMdd_HHmmss_SS`, where `SS` is centiseconds
pub fn encode_capture_name(prefix: &str, taken: DateTime<Local>) -> String {
    let centis = (taken.timestamp_subsec_millis() / 10).min(99);
    format!("{}_{}_{:02}", prefix, taken.format(SECONDS_FORMAT), centis)
}

/// Parse the capture timestamp out of a name, with or without extension
pub fn parse_capture_time(name: &str) -> Option<DateTime<Local>> {
    let stem = match name.rfind('.') {
        Some(dot) => &name[..dot],
        None => name,
    };

    if stem.len() < STAMP_LEN {
        return None;
    }

    // the prefix may be any text; only the fixed-width tail is ASCII
    let split = stem.len() - STAMP_LEN;
    let bytes = stem.as_bytes();
    if split > 0 && bytes[split - 1] != b'_' {
        return None;
    }
    if !stamp_shape_matches(&bytes[split..]) || !stem.is_char_boundary(split) {
        return None;
    }

    let stamp = &stem[split..];

    let naive = NaiveDateTime::parse_from_str(&stamp[..SECONDS_LEN], SECONDS_FORMAT).ok()?;
    let centis: i64 = stamp[SECONDS_LEN + 1..].parse().ok()?;
    let naive = naive + Duration::milliseconds(centis * 10);

    Local.from_local_datetime(&naive).earliest()
}

/// `dddddddd_dddddd_dd`
fn stamp_shape_matches(stamp: &[u8]) -> bool {
    stamp.len() == STAMP_LEN
        && stamp.iter().enumerate().all(|(i, b)| match i {
            8 | 15 => *b == b'_',
            _ => b.is_ascii_digit(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn sample_instant() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 3, 15, 14, 30, 45)
            .earliest()
            .unwrap()
            + Duration::milliseconds(120)
    }

    #[test]
    fn test_round_trip_through_capture_name() {
        let taken = sample_instant();
        let identity = PhotoIdentity::for_capture(Path::new("/vault"), "photo", taken, "jpg");

        assert_eq!(identity.logical_name, "photo_20240315_143045_12");
        assert_eq!(identity.file_name(), "photo_20240315_143045_12.jpg");
        assert_eq!(identity.date_taken(), taken);
    }

    #[test]
    fn test_parses_name_with_extension() {
        let parsed = parse_capture_time("photo_20231201_080910_05.jpg").unwrap();
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2023, 12, 1));
        assert_eq!((parsed.hour(), parsed.minute(), parsed.second()), (8, 9, 10));
        assert_eq!(parsed.timestamp_subsec_millis(), 50);
    }

    #[test]
    fn test_from_path_splits_format() {
        let identity = PhotoIdentity::from_path(Path::new("/vault/img_20200101_000000_00.png"));
        assert_eq!(identity.logical_name, "img_20200101_000000_00");
        assert_eq!(identity.format, "png");
        assert_eq!(identity.date_taken().year(), 2020);
    }

    #[test]
    fn test_prefix_may_contain_underscores() {
        let parsed = parse_capture_time("my_cool_photo_20220704_235959_99");
        assert_eq!(parsed.unwrap().timestamp_subsec_millis(), 990);
    }

    #[test]
    fn test_unparsable_names_fall_back_to_now() {
        let names = [
            "",
            "photo",
            "holiday.jpg",
            "photo_2024031_143045_12.jpg",
            "photo_20241315_143045_12.jpg",
            "photo_20240315_253045_12.jpg",
            "photo-20240315_143045_12.jpg",
            "photo_20240315-143045_12.jpg",
            "photo_2024O315_143045_12.jpg",
            "zdjęcie_20240315_14304ą_12.jpg",
            "ę20240315_143045_12.jpg",
        ];

        for name in names {
            let before = Local::now();
            let taken = PhotoIdentity::new(name, "jpg", "/vault/x").date_taken();
            let after = Local::now();

            assert!(taken >= before && taken <= after, "{} parsed as {}", name, taken);
        }
    }

    #[test]
    fn test_fallback_is_recomputed_each_call() {
        let identity = PhotoIdentity::new("not_a_capture", "jpg", "/vault/x");
        let first = identity.date_taken();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(identity.date_taken() > first);
    }

    #[test]
    fn test_non_ascii_prefix_round_trips() {
        let taken = sample_instant();
        let identity = PhotoIdentity::for_capture(Path::new("/vault"), "zdjęcie", taken, "jpg");

        assert_eq!(identity.file_name(), "zdjęcie_20240315_143045_12.jpg");
        assert_eq!(identity.date_taken(), taken);
        assert_eq!(parse_capture_time("wakacje_łódź_20240315_143045_12.jpg"), Some(taken));
    }

    #[test]
    fn test_bare_stamp_without_prefix() {
        assert!(parse_capture_time("20240315_143045_12").is_some());
    }
}
