use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;

/// Asynchronous key-value substrate the identity store persists into.
///
/// Every call is awaited by the store; a returned `Ok` means the write is
/// acknowledged by the backend.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value under `key`, `None` if it was never written or removed
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Replace the value under `key`
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Remove `key`; removing an absent key succeeds
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}
