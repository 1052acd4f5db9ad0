// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live job updates over WebSocket.
//!
//! Connects, authenticates with the user id and public API key, and turns
//! server messages into [`FeedEvent`]s. Reconnects on a fixed interval; gives
//! up after a bounded number of consecutive failed attempts. Each instance is
//! constructed and started explicitly.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// Credentials sent in the `authenticate` message.
#[derive(Debug, Clone)]
pub struct FeedAuth {
    pub user_id: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum FeedEvent {
    Connected,
    Authenticated,
    NewJob(serde_json::Value),
    JobStatusChanged(serde_json::Value),
    ServerError(String),
    Disconnected,
    /// Reconnect attempts exhausted; the feed has stopped.
    GaveUp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedStatus {
    pub running: bool,
    pub connected: bool,
    pub reconnect_attempts: u32,
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct JobFeed {
    url: String,
    auth: FeedAuth,
    reconnect_interval: Duration,
    max_reconnect_attempts: u32,
    event_tx: broadcast::Sender<FeedEvent>,
    status: Mutex<FeedStatus>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    running: Mutex<Option<Running>>,
}

impl JobFeed {
    pub fn new(
        url: impl Into<String>,
        auth: FeedAuth,
        reconnect_interval: Duration,
        max_reconnect_attempts: u32,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(256);
        Arc::new(Self {
            url: url.into(),
            auth,
            reconnect_interval,
            max_reconnect_attempts,
            event_tx,
            status: Mutex::new(FeedStatus::default()),
            outbound: Mutex::new(None),
            running: Mutex::new(None),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.event_tx.subscribe()
    }

    pub fn status(&self) -> FeedStatus {
        *lock(&self.status)
    }

    /// Start the connection task. No-op if already running.
    pub fn start(self: &Arc<Self>) {
        let mut running = lock(&self.running);
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return;
        }
        lock(&self.status).running = true;
        let cancel = CancellationToken::new();
        let this = Arc::clone(self);
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move { this.run(task_cancel).await });
        *running = Some(Running { cancel, handle });
    }

    /// Close the connection and wait for the task to finish.
    pub async fn stop(&self) {
        let running = lock(&self.running).take();
        if let Some(running) = running {
            running.cancel.cancel();
            let _ = running.handle.await;
        }
        *lock(&self.status) = FeedStatus::default();
    }

    /// Send a JSON message. Returns false when not connected.
    pub fn send(&self, value: &serde_json::Value) -> bool {
        match lock(&self.outbound).as_ref() {
            Some(tx) => tx.send(value.to_string()).is_ok(),
            None => {
                tracing::warn!("job feed not connected, dropping message");
                false
            }
        }
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut attempts = 0u32;
        loop {
            if cancel.is_cancelled() {
                break;
            }

            match tokio_tungstenite::connect_async(self.url.as_str()).await {
                Ok((ws_stream, _)) => {
                    attempts = 0;
                    self.set_status(|s| {
                        s.connected = true;
                        s.reconnect_attempts = 0;
                    });
                    let _ = self.event_tx.send(FeedEvent::Connected);

                    let (mut write, mut read) = ws_stream.split();
                    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
                    *lock(&self.outbound) = Some(out_tx);

                    let hello = authenticate_message(&self.auth);
                    if let Err(e) = write.send(Message::Text(hello.to_string().into())).await {
                        tracing::debug!(err = %e, "feed authenticate send failed");
                    }

                    loop {
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                let _ = write.close().await;
                                break;
                            }
                            out = out_rx.recv() => {
                                let Some(text) = out else { break };
                                if let Err(e) = write.send(Message::Text(text.into())).await {
                                    tracing::debug!(err = %e, "feed send failed");
                                    break;
                                }
                            }
                            msg = read.next() => match msg {
                                Some(Ok(Message::Text(text))) => {
                                    if let Some(event) = parse_message(text.as_str()) {
                                        let _ = self.event_tx.send(event);
                                    }
                                }
                                Some(Ok(Message::Close(_))) | None => break,
                                Some(Ok(_)) => {}
                                Some(Err(e)) => {
                                    tracing::debug!(err = %e, "feed ws error");
                                    break;
                                }
                            },
                        }
                    }

                    *lock(&self.outbound) = None;
                    self.set_status(|s| s.connected = false);
                    let _ = self.event_tx.send(FeedEvent::Disconnected);
                }
                Err(e) => {
                    tracing::debug!(url = %self.url, err = %e, "feed connect failed");
                }
            }

            if cancel.is_cancelled() {
                break;
            }
            if attempts >= self.max_reconnect_attempts {
                tracing::warn!(attempts, "job feed giving up");
                let _ = self.event_tx.send(FeedEvent::GaveUp);
                break;
            }
            attempts += 1;
            self.set_status(|s| s.reconnect_attempts = attempts);
            tracing::debug!(attempt = attempts, max = self.max_reconnect_attempts, "feed reconnecting");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_interval) => {}
            }
        }
        self.set_status(|s| {
            s.running = false;
            s.connected = false;
        });
    }

    fn set_status(&self, f: impl FnOnce(&mut FeedStatus)) {
        f(&mut lock(&self.status));
    }
}

fn authenticate_message(auth: &FeedAuth) -> serde_json::Value {
    serde_json::json!({
        "type": "authenticate",
        "userId": auth.user_id,
        "apiKey": auth.api_key,
    })
}

/// Parse a server message. Unknown types and malformed JSON yield `None`.
pub fn parse_message(text: &str) -> Option<FeedEvent> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    match value.get("type")?.as_str()? {
        "authenticated" => Some(FeedEvent::Authenticated),
        "new_job" => Some(FeedEvent::NewJob(value.get("job").cloned().unwrap_or_default())),
        "job_status_changed" => Some(FeedEvent::JobStatusChanged(value)),
        "error" => Some(FeedEvent::ServerError(
            value.get("message").and_then(|m| m.as_str()).unwrap_or("unknown error").to_owned(),
        )),
        other => {
            tracing::debug!(kind = other, "ignoring feed message");
            None
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
#[path = "feed_tests.rs"]
mod tests;
