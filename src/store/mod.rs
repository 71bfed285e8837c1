//! The external key-value store contract and its backends.
//!
//! The store is the only channel between clients: the session document
//! lives under the room key and every vote under its own per-voter key.
//! There are no transactions and no compare-and-swap; writers replace
//! values wholesale.

mod http;
mod memory;

use async_trait::async_trait;
use std::time::Duration;

pub use http::HttpStore;
pub use memory::MemoryStore;

use crate::types::RoomCode;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned status {0}")]
    Status(u16),

    #[error("store response parsing failed: {0}")]
    Parse(String),
}

/// Plain key-value store with TTL expiry and prefix deletion. Both
/// operations any backend must honor byte-for-byte: values written are
/// returned unchanged, and a prefix delete removes exactly the keys that
/// start with the prefix.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Scan-then-batch-delete of every key starting with `prefix`.
    async fn delete_by_prefix(&self, prefix: &str) -> StoreResult<()>;
}

/// Key of a room's session document.
pub fn room_key(code: &str) -> String {
    format!("gifclash:room:{code}")
}

/// Key of one voter's vote record for a matchup.
pub fn vote_key(code: &RoomCode, heat: usize, matchup: usize, voter: &str) -> String {
    format!("gifclash:vote:{code}:{heat}:{matchup}:{voter}")
}

/// Prefix covering every vote record of a room.
pub fn vote_prefix(code: &RoomCode) -> String {
    format!("gifclash:vote:{code}:")
}
