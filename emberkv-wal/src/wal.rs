//! Main WAL implementation.
//!
//! A single mutex guards the active segment, the buffered writer, and the
//! sequence counter; `append`, the background sync tick, and `close` all
//! serialize on it. On-disk record order therefore equals sequence order.

use crate::error::WalError;
use crate::record::{self, RecordType, WalRecord};
use crate::segment::{self, Segment, SegmentId};
use crate::SYNC_INTERVAL;
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default maximum segment size before rotation (16 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Default number of retained segments.
pub const DEFAULT_MAX_SEGMENTS: usize = 10;

/// WAL configuration.
#[derive(Debug, Clone)]
pub struct WalConfig {
    /// Directory holding the segment files. Created if missing.
    pub dir: PathBuf,
    /// Fsync the active segment on every append.
    pub force_sync: bool,
    /// On-disk segment size that triggers rotation.
    pub max_file_size: u64,
    /// Upper bound on retained segments, enforced at rotation.
    pub max_segments: usize,
}

impl WalConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            force_sync: false,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_segments: DEFAULT_MAX_SEGMENTS,
        }
    }

    pub fn with_force_sync(mut self, force_sync: bool) -> Self {
        self.force_sync = force_sync;
        self
    }

    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    pub fn with_max_segments(mut self, count: usize) -> Self {
        self.max_segments = count;
        self
    }
}

struct WalInner {
    dir: PathBuf,
    segment: Segment,
    writer: BufWriter<File>,
    last_sequence: u64,
    force_sync: bool,
    max_file_size: u64,
    max_segments: usize,
}

/// Write-ahead log over a directory of numbered segments.
pub struct Wal {
    inner: Arc<Mutex<WalInner>>,
    shutdown: Sender<()>,
    closed: AtomicBool,
}

impl Wal {
    /// Opens or creates a WAL at the configured directory.
    ///
    /// Discovers existing segments, creates segment 0 when none parse, opens
    /// the highest-id segment for append, recovers the last sequence number
    /// from it, and starts the background sync task.
    pub fn open(config: WalConfig) -> Result<Self, WalError> {
        fs::create_dir_all(&config.dir)?;

        let segments = segment::list_segments(&config.dir)?;
        let active_id = if segments.is_empty() {
            Segment::create(&config.dir, 0)?;
            0
        } else {
            segment::max_segment_id(&segments)
        };

        let active = Segment::open(&config.dir, active_id)?;
        let last_sequence = last_sequence_in_segment(active.path())?;
        let writer = BufWriter::new(active.try_clone_file()?);

        let inner = Arc::new(Mutex::new(WalInner {
            dir: config.dir,
            segment: active,
            writer,
            last_sequence,
            force_sync: config.force_sync,
            max_file_size: config.max_file_size,
            max_segments: config.max_segments,
        }));

        let (shutdown, ticker) = bounded(1);
        let sync_inner = Arc::clone(&inner);
        std::thread::Builder::new()
            .name("emberkv-wal-sync".to_string())
            .spawn(move || sync_loop(sync_inner, ticker))?;

        tracing::info!(
            segment = active_id,
            last_sequence,
            "WAL opened"
        );

        Ok(Self {
            inner,
            shutdown,
            closed: AtomicBool::new(false),
        })
    }

    /// Appends one record and flushes it to the OS.
    ///
    /// The sequence counter advances only if every step succeeds; a failed
    /// append leaves the WAL logically unchanged (bytes may still have
    /// reached the file, but the next append reuses the sequence number).
    pub fn append(
        &self,
        record_type: RecordType,
        key: &str,
        value: Vec<u8>,
        expires_at_unix_nanos: i64,
    ) -> Result<(), WalError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(WalError::Closed);
        }

        let mut inner = self.inner.lock();

        let sequence = inner.last_sequence + 1;
        let record = WalRecord::new(
            record_type,
            sequence,
            key.to_string(),
            value,
            expires_at_unix_nanos,
        )?;
        let framed = record.encode_framed()?;

        inner.rotate_if_needed()?;

        inner.writer.write_all(&framed)?;
        inner.writer.flush()?;
        if inner.force_sync {
            inner.segment.sync()?;
        }

        inner.last_sequence = sequence;
        Ok(())
    }

    /// Reads every decodable record from every segment, ascending by segment
    /// id and file order within each segment.
    ///
    /// A torn tail, an undecodable record, or a CRC mismatch ends the read of
    /// that segment but not of the log as a whole.
    pub fn read_all(&self) -> Result<Vec<WalRecord>, WalError> {
        let inner = self.inner.lock();
        let segments = segment::list_segments(&inner.dir)?;

        let mut records = Vec::new();
        for (_, path) in segments {
            read_segment_into(&path, &mut records)?;
        }
        Ok(records)
    }

    /// Returns the last issued sequence number (0 for a fresh log).
    pub fn last_sequence(&self) -> u64 {
        self.inner.lock().last_sequence
    }

    /// Stops the sync task, flushes, and fsyncs the active segment.
    ///
    /// A second call returns [`WalError::Closed`].
    pub fn close(&self) -> Result<(), WalError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(WalError::Closed);
        }

        // The sync task observes the signal between ticks; durability does
        // not depend on it because the flush + fsync happen right here.
        let _ = self.shutdown.send(());

        let mut inner = self.inner.lock();
        inner.writer.flush()?;
        inner.segment.sync()?;
        Ok(())
    }
}

impl WalInner {
    /// Rotates the active segment if it has reached the size threshold.
    ///
    /// Ordering: retire old (flush, fsync, close), create and install the new
    /// segment, then delete retired segments. A deletion failure surfaces as
    /// an error but the WAL always has an active segment afterwards.
    fn rotate_if_needed(&mut self) -> Result<(), WalError> {
        if self.segment.size()? < self.max_file_size {
            return Ok(());
        }

        self.writer.flush()?;
        self.segment.sync()?;

        let segments = segment::list_segments(&self.dir)?;
        let next_id = segment::max_segment_id(&segments) + 1;

        let new_segment = Segment::create(&self.dir, next_id).map_err(as_rotation)?;
        self.writer = BufWriter::new(new_segment.try_clone_file()?);
        // Dropping the previous segment handle closes the retired file.
        self.segment = new_segment;

        self.enforce_retention(&segments)?;

        tracing::debug!(segment = next_id, "rotated to new segment");
        Ok(())
    }

    /// Deletes the lowest-id segments from the pre-rotation listing so that
    /// at most `max_segments` remain once the new segment is counted.
    fn enforce_retention(&self, segments: &[(SegmentId, PathBuf)]) -> Result<(), WalError> {
        if segments.len() < self.max_segments {
            return Ok(());
        }

        let excess = (segments.len() - self.max_segments + 1).min(segments.len());
        for (id, path) in &segments[..excess] {
            segment::delete_segment(path).map_err(as_rotation)?;
            tracing::debug!(segment = *id, "retired segment deleted");
        }
        Ok(())
    }
}

fn as_rotation(err: WalError) -> WalError {
    match err {
        WalError::Io(e) => WalError::Rotation(e),
        other => other,
    }
}

/// Periodic flush + fsync until the shutdown signal fires (or the WAL is
/// dropped, which disconnects the channel). Failures are logged and retried
/// on the next tick.
fn sync_loop(inner: Arc<Mutex<WalInner>>, shutdown: Receiver<()>) {
    loop {
        match shutdown.recv_timeout(SYNC_INTERVAL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
            Err(RecvTimeoutError::Timeout) => {
                let mut inner = inner.lock();
                if let Err(e) = inner.writer.flush() {
                    tracing::error!("WAL background flush failed: {e}");
                }
                if let Err(e) = inner.segment.sync() {
                    tracing::error!("WAL background fsync failed: {e}");
                }
            }
        }
    }
}

/// Streams the framed records of one segment into `records`, stopping at the
/// first torn or corrupt record. Only genuine I/O failures are fatal.
fn read_segment_into(path: &Path, records: &mut Vec<WalRecord>) -> Result<(), WalError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    loop {
        let body = match record::read_frame(&mut reader) {
            Ok(Some(body)) => body,
            Ok(None) => break,
            Err(WalError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                tracing::warn!(
                    segment = %path.display(),
                    "torn record at segment tail, stopping segment read"
                );
                break;
            }
            Err(WalError::Decode(e)) => {
                tracing::warn!(
                    segment = %path.display(),
                    "unreadable frame ({e}), stopping segment read"
                );
                break;
            }
            Err(e) => return Err(e),
        };

        let record = match WalRecord::decode(&body) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    segment = %path.display(),
                    "undecodable record ({e}), stopping segment read"
                );
                break;
            }
        };

        if let Err(e) = record.verify() {
            tracing::warn!(segment = %path.display(), "{e}, stopping segment read");
            break;
        }

        records.push(record);
    }

    Ok(())
}

/// Scans one segment and returns the sequence number of its last valid
/// record, or 0 if it holds none.
fn last_sequence_in_segment(path: &Path) -> Result<u64, WalError> {
    let mut records = Vec::new();
    read_segment_into(path, &mut records)?;
    Ok(records.last().map(|r| r.sequence).unwrap_or(0))
}
