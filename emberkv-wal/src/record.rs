//! WAL record codec.
//!
//! Each record is framed on disk as:
//!
//! ```text
//! +------------------+---------------------------+
//! | len: i32 (LE)    | record bytes (len bytes)  |
//! +------------------+---------------------------+
//! ```
//!
//! The record bytes are the bincode encoding of [`WalRecord`] with fields in
//! declaration order. The CRC-32 (IEEE) is computed over the encoding of the
//! record with the `crc` field set to zero.

use crate::error::WalError;
use crate::FRAME_PREFIX_SIZE;
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::io::{self, Read};

/// Maximum encoded record size (16 MiB). A frame claiming more than this is
/// treated as garbage rather than allocated.
pub const MAX_RECORD_SIZE: usize = 16 * 1024 * 1024;

/// Type of WAL record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordType {
    /// Key bound to a value (with optional expiration).
    Set,
    /// Key removed.
    Delete,
}

/// A single durable mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalRecord {
    pub record_type: RecordType,
    /// Monotonically increasing, starts at 1 for a fresh log.
    pub sequence: u64,
    pub key: String,
    /// Encoded value bytes; empty for [`RecordType::Delete`].
    pub value: Vec<u8>,
    /// Nanoseconds since the Unix epoch; 0 means no expiration.
    pub expires_at_unix_nanos: i64,
    /// CRC-32 (IEEE) over the encoding of this record with `crc` zeroed.
    pub crc: u32,
}

impl WalRecord {
    /// Builds a record and stamps its checksum.
    pub fn new(
        record_type: RecordType,
        sequence: u64,
        key: String,
        value: Vec<u8>,
        expires_at_unix_nanos: i64,
    ) -> Result<Self, WalError> {
        let mut record = Self {
            record_type,
            sequence,
            key,
            value,
            expires_at_unix_nanos,
            crc: 0,
        };
        record.crc = record.checksum()?;
        Ok(record)
    }

    fn checksum(&self) -> Result<u32, WalError> {
        let mut unsummed = self.clone();
        unsummed.crc = 0;
        let bytes = bincode::serialize(&unsummed).map_err(WalError::Encode)?;
        Ok(crc32fast::hash(&bytes))
    }

    /// Recomputes the checksum and compares it against the stored one.
    pub fn verify(&self) -> Result<(), WalError> {
        let actual = self.checksum()?;
        if self.crc != actual {
            return Err(WalError::CorruptRecord {
                sequence: self.sequence,
                expected: self.crc,
                actual,
            });
        }
        Ok(())
    }

    /// Encodes the record body (without framing).
    pub fn encode(&self) -> Result<Vec<u8>, WalError> {
        let bytes = bincode::serialize(self).map_err(WalError::Encode)?;
        if bytes.len() > MAX_RECORD_SIZE {
            return Err(WalError::Encode(Box::new(bincode::ErrorKind::Custom(
                format!("record of {} bytes exceeds {}", bytes.len(), MAX_RECORD_SIZE),
            ))));
        }
        Ok(bytes)
    }

    /// Decodes a record body. The checksum is not verified here.
    pub fn decode(bytes: &[u8]) -> Result<Self, WalError> {
        bincode::deserialize(bytes).map_err(WalError::Decode)
    }

    /// Encodes the record together with its length prefix.
    pub fn encode_framed(&self) -> Result<BytesMut, WalError> {
        let body = self.encode()?;
        let mut buf = BytesMut::with_capacity(FRAME_PREFIX_SIZE + body.len());
        buf.put_i32_le(body.len() as i32);
        buf.put_slice(&body);
        Ok(buf)
    }
}

/// Reads one framed record body from `reader`.
///
/// Returns `Ok(None)` on a clean end of file (no prefix bytes at all). A
/// partial prefix or short body surfaces as `WalError::Io` with
/// [`io::ErrorKind::UnexpectedEof`] so callers can recognize a torn tail. A
/// nonsensical length prefix is reported as a decode failure.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, WalError> {
    let mut prefix = [0u8; FRAME_PREFIX_SIZE];
    let mut filled = 0;
    while filled < prefix.len() {
        let n = reader.read(&mut prefix[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(WalError::Io(io::ErrorKind::UnexpectedEof.into()));
        }
        filled += n;
    }

    let len = i32::from_le_bytes(prefix);
    if len < 0 || len as usize > MAX_RECORD_SIZE {
        return Err(WalError::Decode(Box::new(bincode::ErrorKind::Custom(
            format!("invalid frame length {}", len),
        ))));
    }

    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body)?;
    Ok(Some(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample(sequence: u64) -> WalRecord {
        WalRecord::new(
            RecordType::Set,
            sequence,
            "user:42".to_string(),
            b"payload".to_vec(),
            1_700_000_000_000_000_000,
        )
        .unwrap()
    }

    #[test]
    fn test_record_roundtrip() {
        let record = sample(7);
        let encoded = record.encode().unwrap();
        let decoded = WalRecord::decode(&encoded).unwrap();

        assert_eq!(decoded, record);
        decoded.verify().unwrap();
    }

    #[test]
    fn test_delete_record_has_empty_value() {
        let record = WalRecord::new(RecordType::Delete, 3, "k".to_string(), Vec::new(), 0).unwrap();
        let decoded = WalRecord::decode(&record.encode().unwrap()).unwrap();
        assert_eq!(decoded.record_type, RecordType::Delete);
        assert!(decoded.value.is_empty());
        assert_eq!(decoded.expires_at_unix_nanos, 0);
    }

    #[test]
    fn test_corrupted_record_detection() {
        let mut record = sample(1);
        record.value[0] ^= 0xFF;

        let err = record.verify().unwrap_err();
        assert!(matches!(err, WalError::CorruptRecord { sequence: 1, .. }));
    }

    #[test]
    fn test_crc_ignores_stored_crc_field() {
        // Two records differing only in the stamped crc must checksum alike.
        let record = sample(5);
        let mut tampered = record.clone();
        tampered.crc ^= 0xDEAD_BEEF;
        assert!(tampered.verify().is_err());
        record.verify().unwrap();
    }

    #[test]
    fn test_framed_roundtrip() {
        let record = sample(9);
        let framed = record.encode_framed().unwrap();

        let mut cursor = Cursor::new(framed.to_vec());
        let body = read_frame(&mut cursor).unwrap().unwrap();
        let decoded = WalRecord::decode(&body).unwrap();
        assert_eq!(decoded, record);

        // Next read is a clean EOF.
        assert!(read_frame(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn test_torn_prefix() {
        let mut cursor = Cursor::new(vec![0x10, 0x00]);
        let err = read_frame(&mut cursor).unwrap_err();
        match err {
            WalError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[test]
    fn test_torn_body() {
        let record = sample(2);
        let mut framed = record.encode_framed().unwrap().to_vec();
        framed.truncate(framed.len() - 3);

        let mut cursor = Cursor::new(framed);
        let err = read_frame(&mut cursor).unwrap_err();
        match err {
            WalError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[test]
    fn test_garbage_length_prefix() {
        let mut framed = Vec::new();
        framed.extend_from_slice(&(-5i32).to_le_bytes());
        let mut cursor = Cursor::new(framed);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(WalError::Decode(_))
        ));

        let mut framed = Vec::new();
        framed.extend_from_slice(&(i32::MAX).to_le_bytes());
        let mut cursor = Cursor::new(framed);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(WalError::Decode(_))
        ));
    }
}
