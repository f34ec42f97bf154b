//! Privacam - Transient Share Cache
//!
//! Decrypted or redacted copies handed to other apps are staged under
//! `<cache_dir>/share/`. Everything there is disposable. Each export gets
//! its own session directory so closing one session never touches another;
//! a whole-root clear waits for in-flight writes and blocks new ones.

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::PrivacamConfig;
use crate::copy_name::{self, DEFAULT_COPY_ATTEMPTS};
use crate::error::{PrivacamError, PrivacamResult};

/// Share root directory name inside the cache directory
pub const SHARE_DIR_NAME: &str = "share";

/// Zero-fill chunk for scrubbing
const SCRUB_CHUNK: usize = 1024 * 1024;

/// Unlinks one walked entry; `true` for directories
type RemoveFn = fn(&Path, bool) -> io::Result<()>;

/// Outcome of a clear
#[derive(Debug, Default)]
pub struct ClearReport {
    /// Entries removed (files and directories)
    pub removed: usize,
    /// Entries that could not be removed
    pub failures: Vec<(PathBuf, String)>,
}

impl ClearReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Share Cache Manager
pub struct ShareCacheManager {
    /// `<cache_dir>/share`
    root: PathBuf,
    /// Zero files before unlinking
    scrub: bool,
    /// Copy naming attempts
    copy_attempts: u32,
    /// Writers share, whole-root clears take it exclusively
    gate: RwLock<()>,
    remove: RemoveFn,
}

impl ShareCacheManager {
    /// Create manager for the share root under `cache_dir`
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            root: cache_dir.join(SHARE_DIR_NAME),
            scrub: false,
            copy_attempts: DEFAULT_COPY_ATTEMPTS,
            gate: RwLock::new(()),
            remove: remove_entry,
        }
    }

    pub fn from_config(config: &PrivacamConfig) -> Self {
        Self {
            scrub: config.scrub_share_files,
            copy_attempts: config.copy_name_attempts,
            ..Self::new(&config.cache_dir)
        }
    }

    /// Overwrite contents with zeros before deleting
    pub fn with_scrub(mut self, scrub: bool) -> Self {
        self.scrub = scrub;
        self
    }

    pub fn share_root(&self) -> &Path {
        &self.root
    }

    /// Remove the share root and everything in it.
    ///
    /// A missing root counts as cleared. Returns `false` if any entry
    /// survived; entries already removed stay removed.
    pub fn clear_share_directory(&self) -> bool {
        let report = self.clear_with_report();
        if !report.is_success() {
            for (path, reason) in &report.failures {
                log::warn!("Could not remove {}: {}", path.display(), reason);
            }
        }
        report.is_success()
    }

    /// Same as [`clear_share_directory`](Self::clear_share_directory), with details
    pub fn clear_with_report(&self) -> ClearReport {
        let _exclusive = self.gate.write();
        let report = purge(&self.root, self.scrub, self.remove);
        log::debug!(
            "Cleared share root {}: {} removed, {} failed",
            self.root.display(),
            report.removed,
            report.failures.len()
        );
        report
    }

    /// Start an export session with its own directory
    pub fn begin_session(self: &Arc<Self>) -> PrivacamResult<ShareSession> {
        let id = Uuid::new_v4();
        let dir = self.root.join(id.to_string());

        {
            let _shared = self.gate.read();
            fs::create_dir_all(&dir)?;
        }
        log::debug!("Opened share session {}", id);

        Ok(ShareSession {
            manager: Arc::clone(self),
            id,
            dir,
            closed: false,
        })
    }
}

/// One export's slice of the share cache. Cleared on close or drop.
pub struct ShareSession {
    manager: Arc<ShareCacheManager>,
    id: Uuid,
    dir: PathBuf,
    closed: bool,
}

impl ShareSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `data` as `name`, or as a `_cp` copy if `name` is taken.
    ///
    /// `name` must be a single plain file name; anything that would resolve
    /// outside the session directory is rejected.
    pub fn stage(&self, name: &str, data: &[u8]) -> PrivacamResult<PathBuf> {
        if self.closed {
            return Err(PrivacamError::ShareSession(format!("session {} is closed", self.id)));
        }
        if !is_plain_file_name(name) {
            return Err(PrivacamError::ShareSession(format!(
                "refusing to stage {:?} outside session {}",
                name, self.id
            )));
        }

        let _shared = self.manager.gate.read();
        fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(name);
        match copy_name::write_new(&path, data) {
            Ok(()) => Ok(path),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                copy_name::write_copy(&self.dir, name, data, self.manager.copy_attempts)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Entries currently staged
    pub fn staged(&self) -> PrivacamResult<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            paths.push(entry?.path());
        }
        paths.sort();
        Ok(paths)
    }

    /// End the session without removing its files; returns the directory.
    /// A later whole-root clear still removes them.
    pub fn keep(mut self) -> PathBuf {
        self.closed = true;
        self.dir.clone()
    }

    /// Remove this session's directory
    pub fn close(mut self) -> bool {
        self.closed = true;
        self.purge()
    }

    fn purge(&self) -> bool {
        let report = {
            let _shared = self.manager.gate.read();
            purge(&self.dir, self.manager.scrub, self.manager.remove)
        };
        for (path, reason) in &report.failures {
            log::warn!("Could not remove {}: {}", path.display(), reason);
        }
        log::debug!("Closed share session {} ({} removed)", self.id, report.removed);
        report.is_success()
    }
}

impl Drop for ShareSession {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            self.purge();
        }
    }
}

/// Exactly one normal path component
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn remove_entry(path: &Path, is_dir: bool) -> io::Result<()> {
    if is_dir {
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    }
}

/// Delete `root` and everything below it, children first. A symlinked root
/// is unlinked, never followed.
fn purge(root: &Path, scrub: bool, remove: RemoveFn) -> ClearReport {
    let mut report = ClearReport::default();

    match fs::symlink_metadata(root) {
        Err(e) if e.kind() == ErrorKind::NotFound => return report,
        Err(e) => {
            report.failures.push((root.to_path_buf(), e.to_string()));
            return report;
        }
        Ok(_) => {}
    }

    for entry in WalkDir::new(root).follow_root_links(false).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                report.failures.push((path, e.to_string()));
                continue;
            }
        };

        let path = entry.path();
        let file_type = entry.file_type();
        if scrub && file_type.is_file() {
            if let Err(e) = scrub_file(path) {
                log::debug!("Scrub of {} failed: {}", path.display(), e);
            }
        }
        let result = remove(path, file_type.is_dir());

        match result {
            Ok(()) => report.removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => report.failures.push((path.to_path_buf(), e.to_string())),
        }
    }

    report
}

/// Overwrite a file's contents with zeros
fn scrub_file(path: &Path) -> io::Result<()> {
    let size = fs::metadata(path)?.len() as usize;
    if size == 0 {
        return Ok(());
    }

    let mut file = OpenOptions::new().write(true).open(path)?;
    let zeros = vec![0u8; size.min(SCRUB_CHUNK)];
    let mut remaining = size;
    while remaining > 0 {
        let n = remaining.min(zeros.len());
        file.write_all(&zeros[..n])?;
        remaining -= n;
    }
    file.sync_all()
}
