// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted client-side key/value storage.
//!
//! Values are plain strings (JSON-encoded where structured). Stores announce
//! mutations made by *other* contexts (another process sharing the same state
//! file, or a simulated second tab in tests) so the session manager can stay in
//! sync without polling. A handle never receives notifications for its own
//! writes.

pub mod file;
pub mod memory;

use std::sync::Arc;

use tokio::sync::broadcast;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Storage keys used by the client.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const PENDING_PAYMENT: &str = "pendingSubscription";
    pub const NOTIFICATIONS_MUTED: &str = "notificationSoundMuted";

    /// Keys whose external mutation affects the authenticated session.
    pub const TOKEN_KEYS: &[&str] = &[ACCESS_TOKEN, REFRESH_TOKEN];
}

/// A key changed outside this store handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    /// New value, or `None` if the key was removed.
    pub value: Option<String>,
}

/// Persisted key/value store shared by the token, payment and preference
/// components.
pub trait KeyValueStore: Send + Sync {
    /// Read a value. Absent keys return `None`.
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> anyhow::Result<()>;

    /// Raw subscription to external changes on any key.
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;

    /// Subscribe to external changes affecting any of `keys`.
    fn on_external_change(&self, keys: &[&str]) -> ExternalChanges {
        ExternalChanges {
            keys: keys.iter().map(|k| (*k).to_owned()).collect(),
            rx: self.subscribe(),
        }
    }
}

/// Shared store handle.
pub type SharedStore = Arc<dyn KeyValueStore>;

/// Filtered stream of external storage changes.
pub struct ExternalChanges {
    keys: Vec<String>,
    rx: broadcast::Receiver<StorageChange>,
}

impl ExternalChanges {
    /// Wait for the next change to a watched key.
    ///
    /// Returns `None` once the store is dropped. A lagged receiver yields a
    /// synthetic change for the first watched key so the caller re-checks.
    pub async fn next(&mut self) -> Option<StorageChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) if self.keys.iter().any(|k| *k == change.key) => return Some(change),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!(skipped = n, "storage change listener lagged");
                    let key = self.keys.first().cloned().unwrap_or_default();
                    return Some(StorageChange { key, value: None });
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
