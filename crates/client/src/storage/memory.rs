// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;

use super::{KeyValueStore, StorageChange};

/// In-process store. Useful for embedding and for tests.
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    change_tx: broadcast::Sender<StorageChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(64);
        Self { values: Mutex::new(HashMap::new()), change_tx }
    }

    /// Apply a mutation as if another context had made it, and notify
    /// subscribers.
    pub fn apply_external(&self, key: &str, value: Option<&str>) {
        {
            let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
            match value {
                Some(v) => {
                    values.insert(key.to_owned(), v.to_owned());
                }
                None => {
                    values.remove(key);
                }
            }
        }
        let _ = self
            .change_tx
            .send(StorageChange { key: key.to_owned(), value: value.map(str::to_owned) });
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.values.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.values.lock().unwrap_or_else(|e| e.into_inner()).remove(key);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.change_tx.subscribe()
    }
}
