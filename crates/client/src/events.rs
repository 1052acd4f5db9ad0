// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-wide event hub.
//!
//! The gateway raises `TokensCleared` here when a request-path failure wipes
//! the session; the session manager listens for it alongside external storage
//! changes. The shell subscribes to everything to drive notifications.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Tokens were removed because the session can no longer be refreshed.
    TokensCleared { reason: String },
    /// A refresh stored a new token pair.
    TokensRefreshed,
    /// The session moved between signed-in and signed-out.
    SessionChanged { logged_in: bool },
    /// A pending payment reached a final local outcome.
    PaymentReconciled { payment_id: String, outcome: String },
    /// Something the shell should show the user.
    Notification { level: NotificationLevel, message: String },
}

/// Broadcast fan-out for [`ClientEvent`]s.
#[derive(Clone)]
pub struct EventHub {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(128);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Having no subscribers is fine.
    pub fn emit(&self, event: ClientEvent) {
        let _ = self.tx.send(event);
    }

    pub fn notify(&self, level: NotificationLevel, message: impl Into<String>) {
        self.emit(ClientEvent::Notification { level, message: message.into() });
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
