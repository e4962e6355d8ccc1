//! Segment file management.
//!
//! The log is a directory of numbered files named `wal-segment-<N>`. The
//! highest-numbered segment is the active write target; rotation creates
//! `max + 1` and retention deletes from the low end. Files whose suffix is
//! not a non-negative decimal integer are ignored during discovery.

use crate::error::WalError;
use crate::SEGMENT_PREFIX;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// Segment identifier parsed from the filename suffix.
pub type SegmentId = u64;

/// Returns the filename for a segment id.
pub fn segment_filename(id: SegmentId) -> String {
    format!("{SEGMENT_PREFIX}{id}")
}

/// Returns the full path of a segment inside `dir`.
pub fn segment_path(dir: &Path, id: SegmentId) -> PathBuf {
    dir.join(segment_filename(id))
}

/// Parses a segment id from a filename, or `None` if it doesn't match the
/// `wal-segment-<N>` scheme.
pub fn parse_segment_filename(name: &str) -> Option<SegmentId> {
    name.strip_prefix(SEGMENT_PREFIX)?.parse().ok()
}

/// Lists the segments in `dir`, sorted ascending by id.
///
/// Filenames that do not parse are skipped, never fatal.
pub fn list_segments(dir: &Path) -> Result<Vec<(SegmentId, PathBuf)>, WalError> {
    let mut segments = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(id) = parse_segment_filename(&name.to_string_lossy()) {
            segments.push((id, entry.path()));
        }
    }

    segments.sort_by_key(|(id, _)| *id);
    Ok(segments)
}

/// Returns the largest id in a discovery listing, or 0 if it is empty.
pub fn max_segment_id(segments: &[(SegmentId, PathBuf)]) -> SegmentId {
    segments.last().map(|(id, _)| *id).unwrap_or(0)
}

/// Removes a segment file.
pub fn delete_segment(path: &Path) -> Result<(), WalError> {
    fs::remove_file(path)?;
    Ok(())
}

/// An open handle to one segment file.
pub struct Segment {
    id: SegmentId,
    path: PathBuf,
    file: File,
}

impl Segment {
    /// Creates the segment file for `id` in append-only write mode (0644).
    pub fn create(dir: &Path, id: SegmentId) -> Result<Self, WalError> {
        let path = segment_path(dir, id);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(0o644)
            .open(&path)?;

        Ok(Self { id, path, file })
    }

    /// Opens the segment file for `id` in append mode, positioned at the end.
    pub fn open(dir: &Path, id: SegmentId) -> Result<Self, WalError> {
        let path = segment_path(dir, id);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(0o644)
            .open(&path)?;
        file.seek(SeekFrom::End(0))?;

        Ok(Self { id, path, file })
    }

    /// Returns the segment id.
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Returns the segment file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current on-disk size. Bytes still sitting in a buffered
    /// writer are not counted.
    pub fn size(&self) -> Result<u64, WalError> {
        Ok(self.file.metadata()?.len())
    }

    /// Fsyncs the segment file.
    pub fn sync(&self) -> Result<(), WalError> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Returns a second handle to the underlying file, sharing its cursor.
    pub fn try_clone_file(&self) -> Result<File, WalError> {
        Ok(self.file.try_clone()?)
    }
}
