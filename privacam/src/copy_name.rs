//! Privacam - Copy Naming
//!
//! Collision-free names for duplicated photos: `stem_cp.ext`, then
//! `stem_cp1.ext`, `stem_cp2.ext`, ... probed in order.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{PrivacamError, PrivacamResult};

/// Marker inserted between stem and extension
pub const COPY_MARKER: &str = "_cp";

/// Default number of listing/create rounds before giving up
pub const DEFAULT_COPY_ATTEMPTS: u32 = 8;

/// Read access to the names in a destination directory
pub trait DirectoryListing {
    /// Names of all entries currently present
    fn entry_names(&self) -> PrivacamResult<HashSet<String>>;
}

/// Listing backed by a real directory
#[derive(Debug, Clone)]
pub struct LocalDirectory {
    path: PathBuf,
}

impl LocalDirectory {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DirectoryListing for LocalDirectory {
    fn entry_names(&self) -> PrivacamResult<HashSet<String>> {
        let listing_error = |source| PrivacamError::DirectoryListing {
            path: self.path.clone(),
            source,
        };

        let mut names = HashSet::new();
        for entry in fs::read_dir(&self.path).map_err(listing_error)? {
            let entry = entry.map_err(listing_error)?;
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }

        Ok(names)
    }
}

impl DirectoryListing for HashSet<String> {
    fn entry_names(&self) -> PrivacamResult<HashSet<String>> {
        Ok(self.clone())
    }
}

/// Split on the final dot. A name without a dot is all stem.
pub fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(dot) => (&name[..dot], Some(&name[dot + 1..])),
        None => (name, None),
    }
}

/// Candidate name for probe index `n`; `0` is the bare `_cp` slot
fn candidate(stem: &str, ext: Option<&str>, n: u32) -> String {
    let suffix = if n == 0 {
        COPY_MARKER.to_string()
    } else {
        format!("{}{}", COPY_MARKER, n)
    };

    match ext {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext),
        None => format!("{}{}", stem, suffix),
    }
}

/// First free copy name among `taken`
pub fn next_copy_name(taken: &HashSet<String>, original: &str) -> String {
    let (stem, ext) = split_name(original);

    (0..)
        .map(|n| candidate(stem, ext, n))
        .find(|name| !taken.contains(name))
        .unwrap_or_else(|| candidate(stem, ext, u32::MAX))
}

/// Preferred copy name for `original` in the listed directory.
///
/// The result is only a preference: another writer can take it before the
/// caller creates the file. Use [`write_copy`] to create atomically.
pub fn generate_copy_name(listing: &impl DirectoryListing, original: &str) -> PrivacamResult<String> {
    let taken = listing.entry_names()?;
    Ok(next_copy_name(&taken, original))
}

/// Write `data` as a new copy of `original` inside `dir`.
///
/// The file is created with create-new semantics; losing a race for a name
/// re-reads the directory and tries the next free slot.
pub fn write_copy(dir: &Path, original: &str, data: &[u8], attempts: u32) -> PrivacamResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let listing = LocalDirectory::new(dir);

    for attempt in 0..attempts.max(1) {
        let name = generate_copy_name(&listing, original)?;
        let path = dir.join(&name);

        match write_new(&path, data) {
            Ok(()) => {
                log::debug!("Wrote copy {} of {}", name, original);
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                log::debug!("Copy name {} taken on attempt {}, retrying", name, attempt + 1);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(PrivacamError::CopyNameExhausted {
        name: original.to_string(),
        attempts: attempts.max(1),
    })
}

/// Create `path` only if absent and fill it with `data`. A file that could
/// not be fully written is removed again.
pub(crate) fn write_new(path: &Path, data: &[u8]) -> io::Result<()> {
    fill_new(path, |file| {
        file.write_all(data)?;
        file.sync_all()
    })
}

fn fill_new<F>(path: &Path, fill: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    if let Err(e) = fill(&mut file) {
        drop(file);
        if let Err(cleanup) = fs::remove_file(path) {
            log::warn!("Could not remove partial file {}: {}", path.display(), cleanup);
        }
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn listing(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_empty_directory_gets_plain_cp() {
        let name = generate_copy_name(&listing(&[]), "photo_123.jpg").unwrap();
        assert_eq!(name, "photo_123_cp.jpg");
    }

    #[test]
    fn test_taken_cp_moves_to_cp1() {
        let name = generate_copy_name(&listing(&["photo_123_cp.jpg"]), "photo_123.jpg").unwrap();
        assert_eq!(name, "photo_123_cp1.jpg");
    }

    #[test]
    fn test_probes_past_consecutive_copies() {
        let taken = listing(&["photo_123_cp.jpg", "photo_123_cp1.jpg", "photo_123_cp2.jpg"]);
        let name = generate_copy_name(&taken, "photo_123.jpg").unwrap();
        assert_eq!(name, "photo_123_cp3.jpg");
    }

    #[test]
    fn test_fills_first_gap_instead_of_max_plus_one() {
        let taken = listing(&["photo_123_cp.jpg", "photo_123_cp1.jpg", "photo_123_cp5.jpg"]);
        let name = generate_copy_name(&taken, "photo_123.jpg").unwrap();
        assert_eq!(name, "photo_123_cp2.jpg");
    }

    #[test]
    fn test_dotted_stem_is_preserved() {
        let name = generate_copy_name(&listing(&[]), "my.photo.001.jpg").unwrap();
        assert_eq!(name, "my.photo.001_cp.jpg");
    }

    #[test]
    fn test_name_without_dot_has_no_extension() {
        assert_eq!(next_copy_name(&listing(&[]), "README"), "README_cp");
        assert_eq!(next_copy_name(&listing(&["README_cp"]), "README"), "README_cp1");
    }

    #[test]
    fn test_unrelated_entries_are_ignored() {
        let taken = listing(&["photo_123.jpg", "photo_123_cp.png", "other_cp.jpg"]);
        assert_eq!(next_copy_name(&taken, "photo_123.jpg"), "photo_123_cp.jpg");
    }

    #[test]
    fn test_local_directory_listing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("photo_123_cp.jpg"), b"x").unwrap();

        let name = generate_copy_name(&LocalDirectory::new(dir.path()), "photo_123.jpg").unwrap();
        assert_eq!(name, "photo_123_cp1.jpg");
    }

    #[test]
    fn test_missing_directory_fails_listing() {
        let dir = tempdir().unwrap();
        let missing = LocalDirectory::new(&dir.path().join("gone"));

        let err = generate_copy_name(&missing, "photo_123.jpg").unwrap_err();
        assert!(matches!(err, PrivacamError::DirectoryListing { .. }));
    }

    #[test]
    fn test_write_copy_never_overwrites() {
        let dir = tempdir().unwrap();

        let first = write_copy(dir.path(), "photo_123.jpg", b"one", DEFAULT_COPY_ATTEMPTS).unwrap();
        let second = write_copy(dir.path(), "photo_123.jpg", b"two", DEFAULT_COPY_ATTEMPTS).unwrap();

        assert_eq!(first.file_name().unwrap(), "photo_123_cp.jpg");
        assert_eq!(second.file_name().unwrap(), "photo_123_cp1.jpg");
        assert_eq!(fs::read(&first).unwrap(), b"one");
        assert_eq!(fs::read(&second).unwrap(), b"two");
    }

    #[test]
    fn test_failed_fill_leaves_no_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo_123_cp.jpg");

        let err = fill_new(&path, |file| {
            file.write_all(b"half")?;
            Err(io::Error::new(ErrorKind::Other, "disk full"))
        })
        .unwrap_err();

        assert_eq!(err.to_string(), "disk full");
        assert!(!path.exists());
        let taken = LocalDirectory::new(dir.path()).entry_names().unwrap();
        assert_eq!(next_copy_name(&taken, "photo_123.jpg"), "photo_123_cp.jpg");
    }

    #[test]
    fn test_write_new_refuses_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        fs::write(&path, b"original").unwrap();

        let err = write_new(&path, b"other").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&path).unwrap(), b"original");
    }
}
