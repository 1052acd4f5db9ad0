// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::error::ClientError;
use crate::storage::{keys, SharedStore};

/// Persisted user preferences.
#[derive(Clone)]
pub struct Preferences {
    store: SharedStore,
}

impl Preferences {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Notification sounds are muted. Defaults to unmuted.
    pub fn is_muted(&self) -> bool {
        self.store.get(keys::NOTIFICATIONS_MUTED).is_some_and(|v| v == "true")
    }

    pub fn set_muted(&self, muted: bool) -> Result<(), ClientError> {
        self.store
            .set(keys::NOTIFICATIONS_MUTED, if muted { "true" } else { "false" })
            .map_err(|e| ClientError::Storage(format!("failed to save preference: {e}")))
    }

    /// Flip the mute flag and return the new value.
    pub fn toggle_muted(&self) -> Result<bool, ClientError> {
        let muted = !self.is_muted();
        self.set_muted(muted)?;
        Ok(muted)
    }
}
