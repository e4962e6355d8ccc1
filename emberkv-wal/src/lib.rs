//! # emberkv-wal
//!
//! Segmented write-ahead log for emberkv.
//!
//! This crate provides a durable, append-only record stream with:
//! - Per-record CRC-32 checksums for corruption detection
//! - Numbered segment files with size-triggered rotation
//! - Bounded retention (oldest segments deleted on rotation)
//! - A background flush + fsync task with a fixed interval
//! - Torn-tail tolerant read-back for crash recovery

pub mod error;
pub mod record;
pub mod segment;
pub mod wal;

pub use error::WalError;
pub use record::{RecordType, WalRecord};
pub use segment::{Segment, SegmentId};
pub use wal::{Wal, WalConfig};

use std::time::Duration;

/// Interval of the background flush + fsync task.
pub const SYNC_INTERVAL: Duration = Duration::from_millis(100);

/// Filename prefix of segment files: `wal-segment-<N>`.
pub const SEGMENT_PREFIX: &str = "wal-segment-";

/// Size of the little-endian i32 length prefix framing each record.
pub const FRAME_PREFIX_SIZE: usize = 4;
