//! # emberkv-cache
//!
//! Bounded in-memory LRU cache with per-entry TTL and optional durability
//! through [`emberkv-wal`].
//!
//! Mutations are appended to the write-ahead log before the in-memory state
//! changes; on open, the cache replays the log to rebuild its state. Reads
//! never touch the log. Expiration is checked lazily on access.

pub mod cache;
pub mod codec;
pub mod error;
mod lru;

pub use cache::{Cache, CacheConfig};
pub use codec::{BincodeCodec, CodecError, ValueCodec};
pub use error::CacheError;
