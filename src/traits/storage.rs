//! Key-value persistence trait
//!
//! Durable client storage (the browser's local storage, a settings file, ...)
//! injected wherever state must survive a reload.

use crate::error::Result;

/// Synchronous string key-value storage.
///
/// Reads never fail: an unreadable value is reported as absent.
pub trait KeyValueStore: Send + Sync {
    /// Get the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}
