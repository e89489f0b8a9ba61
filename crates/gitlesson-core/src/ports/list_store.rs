//! ListStore port - list and hash primitives under the task store.
//!
//! Each call is atomic on its own. Composite read-modify-write sequences are
//! not, and callers that need them serialize on their side.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend: {0}")]
    Backend(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Key/value store with FIFO lists and string hashes (Redis-shaped).
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Append to the tail of `list`; returns the new length.
    async fn push_tail(&self, list: &str, value: String) -> Result<usize, StoreError>;

    /// Pop the head of `list` without waiting.
    async fn pop_head(&self, list: &str) -> Result<Option<String>, StoreError>;

    async fn length(&self, list: &str) -> Result<usize, StoreError>;

    async fn hash_set(&self, hash: &str, field: &str, value: String) -> Result<(), StoreError>;

    async fn hash_get(&self, hash: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// All `(field, value)` pairs, in no particular order.
    async fn hash_get_all(&self, hash: &str) -> Result<Vec<(String, String)>, StoreError>;

    /// Returns whether the field existed.
    async fn hash_delete(&self, hash: &str, field: &str) -> Result<bool, StoreError>;

    async fn hash_exists(&self, hash: &str, field: &str) -> Result<bool, StoreError>;
}
