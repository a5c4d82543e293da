//! Output directory holding one WAV file per completed synthesis request.
//!
//! Files are named by a fresh UUID. While a request is in flight its audio
//! lives in a `<uuid>.wav.part` staging file, so a `<uuid>.wav` path only
//! ever holds the complete, last-written segment.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use uuid::Uuid;

use crate::error::ServiceError;
use crate::Segment;

const AUDIO_EXTENSION: &str = "wav";
const STAGING_SUFFIX: &str = ".part";

/// Bounds on how many committed files the output directory keeps.
///
/// The default is unbounded: files are never removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Remove files last modified longer ago than this.
    pub max_age: Option<Duration>,
    /// Keep at most this many files, newest first.
    pub max_files: Option<usize>,
}

impl RetentionPolicy {
    pub fn is_unbounded(&self) -> bool {
        self.max_age.is_none() && self.max_files.is_none()
    }
}

/// Outcome of a retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub retained: usize,
}

#[derive(Debug, Clone)]
pub struct AudioStore {
    dir: PathBuf,
    retention: RetentionPolicy,
}

impl AudioStore {
    /// Open the store, creating the directory if it does not exist.
    pub fn open(dir: impl Into<PathBuf>, retention: RetentionPolicy) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, retention })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    /// Reserve a fresh, unique file name for one synthesis request.
    pub fn allocate(&self) -> PendingAudio {
        let path = self
            .dir
            .join(format!("{}.{AUDIO_EXTENSION}", Uuid::new_v4()));
        let mut staging = path.clone().into_os_string();
        staging.push(STAGING_SUFFIX);
        PendingAudio {
            path,
            staging: PathBuf::from(staging),
            written: false,
            committed: false,
        }
    }

    /// Map a requested name onto the output directory.
    ///
    /// Only the final path component of `requested` is used, so names like
    /// `../../etc/passwd` resolve to `<dir>/passwd`.
    pub fn resolve(&self, requested: &str) -> Option<PathBuf> {
        base_name(requested).map(|name| self.dir.join(name))
    }

    /// Read a committed audio file.
    pub fn read(&self, requested: &str) -> Result<Vec<u8>, ServiceError> {
        let path = self.resolve(requested).ok_or(ServiceError::NotFound)?;
        if !path.is_file() {
            return Err(ServiceError::NotFound);
        }
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ServiceError::NotFound),
            Err(e) => Err(ServiceError::Io(e)),
        }
    }

    /// Apply the retention policy to committed audio files.
    pub fn sweep(&self) -> io::Result<SweepReport> {
        if self.retention.is_unbounded() {
            return Ok(SweepReport::default());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(AUDIO_EXTENSION) {
                continue;
            }
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            files.push((metadata.modified()?, path));
        }

        // Newest first.
        files.sort_by(|a, b| b.cmp(a));

        let now = SystemTime::now();
        let mut report = SweepReport::default();
        for (rank, (modified, path)) in files.into_iter().enumerate() {
            let expired = self.retention.max_age.is_some_and(|max_age| {
                now.duration_since(modified)
                    .map(|age| age > max_age)
                    .unwrap_or(false)
            });
            let overflow = self.retention.max_files.is_some_and(|max| rank >= max);

            if expired || overflow {
                match fs::remove_file(&path) {
                    Ok(()) => report.removed += 1,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
            } else {
                report.retained += 1;
            }
        }

        if report.removed > 0 {
            log::debug!(
                "Retention sweep removed {} file(s), {} retained",
                report.removed,
                report.retained
            );
        }
        Ok(report)
    }
}

/// Final path component of a requested name, splitting on `/` and `\`.
pub fn base_name(requested: &str) -> Option<&str> {
    let name = requested.rsplit(['/', '\\']).next().unwrap_or_default();
    match name {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

/// Audio file being produced by one request.
///
/// Each segment overwrites the staging file; [`commit`](Self::commit) moves
/// it to the final path. Dropping an uncommitted value removes the staging
/// file.
#[derive(Debug)]
pub struct PendingAudio {
    path: PathBuf,
    staging: PathBuf,
    written: bool,
    committed: bool,
}

impl PendingAudio {
    /// Path the audio will have once committed.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_segment(&mut self, segment: &Segment) -> Result<(), hound::Error> {
        segment.write_wav(&self.staging)?;
        self.written = true;
        Ok(())
    }

    pub fn commit(mut self) -> io::Result<PathBuf> {
        if !self.written {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "no segment was written",
            ));
        }
        fs::rename(&self.staging, &self.path)?;
        self.committed = true;
        Ok(self.path.clone())
    }
}

impl Drop for PendingAudio {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        // A failed first write can still leave a partial file behind.
        match fs::remove_file(&self.staging) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove {}: {e}", self.staging.display()),
        }
    }
}
