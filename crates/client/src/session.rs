// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session manager: start-up auth check, proactive refresh, cross-context sync.
//!
//! The manager owns [`SessionState`] and publishes it on a watch channel. It
//! never returns network errors from its checks; anything unrecoverable
//! degrades to [`AuthPhase::Unauthenticated`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::auth;
use crate::api::models::UserProfile;
use crate::error::ClientError;
use crate::events::{ClientEvent, EventHub};
use crate::gateway::Gateway;
use crate::storage::{keys, SharedStore};
use crate::token::TokenStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    Unknown,
    Checking,
    Authenticated,
    Unauthenticated,
}

impl AuthPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Checking => "checking",
            Self::Authenticated => "authenticated",
            Self::Unauthenticated => "unauthenticated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub user: Option<UserProfile>,
    pub is_logged_in: bool,
    /// True until the first auth check resolves.
    pub loading: bool,
    pub phase: AuthPhase,
}

impl Default for SessionState {
    fn default() -> Self {
        Self { user: None, is_logged_in: false, loading: true, phase: AuthPhase::Unknown }
    }
}

/// Result of one proactive refresh check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshCheck {
    /// Not signed in; nothing to do.
    Skipped,
    /// Access token is outside the refresh horizon.
    Fresh,
    Refreshed,
    Failed(ClientError),
}

pub struct SessionManager {
    gateway: Arc<Gateway>,
    tokens: TokenStore,
    store: SharedStore,
    events: EventHub,
    horizon: Duration,
    check_interval: Duration,
    state_tx: watch::Sender<SessionState>,
    /// Root token: cancelled by `stop()`.
    cancel: CancellationToken,
    /// Child token for the current login's refresh loop.
    refresh_loop: Mutex<Option<CancellationToken>>,
    started: AtomicBool,
}

impl SessionManager {
    pub fn new(
        gateway: Arc<Gateway>,
        store: SharedStore,
        events: EventHub,
        horizon: Duration,
        check_interval: Duration,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(SessionState::default());
        Arc::new(Self {
            tokens: gateway.tokens().clone(),
            gateway,
            store,
            events,
            horizon,
            check_interval,
            state_tx,
            cancel: CancellationToken::new(),
            refresh_loop: Mutex::new(None),
            started: AtomicBool::new(false),
        })
    }

    /// Run the initial auth check and start background tasks.
    ///
    /// Idempotent: later calls return the current state.
    pub async fn start(self: &Arc<Self>) -> SessionState {
        if self.started.swap(true, Ordering::AcqRel) {
            return self.state();
        }
        self.spawn_sync_listener();
        self.check_auth().await
    }

    /// Cancel every background task owned by this manager.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.stop_refresh_loop();
    }

    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    pub fn phase(&self) -> AuthPhase {
        self.state_tx.borrow().phase
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Whether a proactive refresh loop is running for the current login.
    pub fn refresh_loop_active(&self) -> bool {
        lock(&self.refresh_loop).as_ref().is_some_and(|t| !t.is_cancelled())
    }

    /// Determine the session from stored tokens, talking to the server as
    /// needed. Never fails.
    pub async fn check_auth(self: &Arc<Self>) -> SessionState {
        self.state_tx.send_modify(|s| s.phase = AuthPhase::Checking);

        if !self.tokens.is_access_expired() {
            match auth::get_profile(&self.gateway).await {
                Ok(user) => return self.set_authenticated(user),
                Err(ClientError::SessionExpired) => return self.set_unauthenticated(),
                Err(e) => {
                    tracing::debug!(err = %e, "profile fetch failed, retrying after refresh");
                }
            }
            return self.refresh_then_profile().await;
        }

        if !self.tokens.is_refresh_expired() {
            return self.refresh_then_profile().await;
        }

        if self.tokens.access().is_some() || self.tokens.refresh().is_some() {
            tracing::info!("stored tokens expired, clearing");
            if let Err(e) = self.tokens.clear() {
                tracing::warn!(err = %e, "failed to clear expired tokens");
            }
        }
        self.set_unauthenticated()
    }

    /// Re-derive the session from storage after an external change.
    ///
    /// Cheap and idempotent: drops to unauthenticated without a network call
    /// when the refresh token is gone, and only runs a full check when usable
    /// tokens appear while signed out.
    pub async fn sync_from_storage(self: &Arc<Self>) -> SessionState {
        match self.phase() {
            AuthPhase::Authenticated if self.tokens.is_refresh_expired() => {
                tracing::info!("session ended in another context");
                self.set_unauthenticated()
            }
            AuthPhase::Unauthenticated | AuthPhase::Unknown if self.tokens.is_authenticated() => {
                tracing::info!("session started in another context");
                self.check_auth().await
            }
            _ => self.state(),
        }
    }

    /// Full re-check regardless of the current phase.
    pub async fn force_sync(self: &Arc<Self>) -> SessionState {
        tracing::debug!(phase = self.phase().as_str(), "forced session sync");
        self.check_auth().await
    }

    /// Mark the session authenticated. Tokens must already be stored.
    pub fn login(self: &Arc<Self>, user: UserProfile) -> SessionState {
        self.set_authenticated(user)
    }

    /// Stop the refresh loop, clear tokens, and mark the session signed out.
    pub fn logout(&self) -> Result<SessionState, ClientError> {
        self.stop_refresh_loop();
        self.tokens.clear()?;
        tracing::info!("logged out");
        Ok(self.set_unauthenticated())
    }

    /// Ask the server to email a verification code.
    pub async fn request_code(&self, email: &str) -> Result<(), ClientError> {
        auth::request_verification_code(&self.gateway, email).await
    }

    /// Verify an emailed code, store the tokens, and sign in.
    pub async fn sign_in(self: &Arc<Self>, email: &str, code: &str) -> Result<UserProfile, ClientError> {
        let resp = auth::verify_email_code(&self.gateway, email, code).await?;
        self.tokens.set(&resp.tokens)?;
        self.login(resp.user.clone());
        Ok(resp.user)
    }

    /// One pass of the proactive refresh loop.
    pub async fn proactive_refresh_tick(self: &Arc<Self>) -> RefreshCheck {
        if self.phase() != AuthPhase::Authenticated {
            return RefreshCheck::Skipped;
        }
        if !self.tokens.is_access_expiring_soon(self.horizon) {
            return RefreshCheck::Fresh;
        }
        // The gateway clears tokens only if the refresh token is itself
        // expired; other failures are left for the request path.
        match self.gateway.refresh().await {
            Ok(_) => RefreshCheck::Refreshed,
            Err(e) => {
                // Only a refresh token that is really gone ends the session.
                if e.requires_reauth() && self.tokens.is_refresh_expired() {
                    self.set_unauthenticated();
                }
                RefreshCheck::Failed(e)
            }
        }
    }

    async fn refresh_then_profile(self: &Arc<Self>) -> SessionState {
        if let Err(e) = self.gateway.refresh().await {
            tracing::warn!(err = %e, "token refresh failed during auth check");
            return self.set_unauthenticated();
        }
        match auth::get_profile(&self.gateway).await {
            Ok(user) => self.set_authenticated(user),
            Err(e) => {
                tracing::warn!(err = %e, "profile fetch failed after refresh");
                self.set_unauthenticated()
            }
        }
    }

    fn set_authenticated(self: &Arc<Self>, user: UserProfile) -> SessionState {
        let changed = self.publish(SessionState {
            user: Some(user),
            is_logged_in: true,
            loading: false,
            phase: AuthPhase::Authenticated,
        });
        self.start_refresh_loop();
        if changed {
            self.events.emit(ClientEvent::SessionChanged { logged_in: true });
        }
        self.state()
    }

    fn set_unauthenticated(&self) -> SessionState {
        self.stop_refresh_loop();
        let was_logged_in = self.state_tx.borrow().is_logged_in;
        self.publish(SessionState {
            user: None,
            is_logged_in: false,
            loading: false,
            phase: AuthPhase::Unauthenticated,
        });
        if was_logged_in {
            self.events.emit(ClientEvent::SessionChanged { logged_in: false });
        }
        self.state()
    }

    /// Replace the state; returns whether login status flipped.
    fn publish(&self, next: SessionState) -> bool {
        let mut flipped = false;
        self.state_tx.send_if_modified(|cur| {
            if *cur == next {
                return false;
            }
            flipped = cur.is_logged_in != next.is_logged_in;
            *cur = next;
            true
        });
        flipped
    }

    fn start_refresh_loop(self: &Arc<Self>) {
        let mut slot = lock(&self.refresh_loop);
        if slot.as_ref().is_some_and(|t| !t.is_cancelled()) {
            return;
        }
        let token = self.cancel.child_token();
        *slot = Some(token.clone());
        drop(slot);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(this.check_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let check = tokio::select! {
                    _ = token.cancelled() => break,
                    check = this.proactive_refresh_tick() => check,
                };
                match check {
                    RefreshCheck::Refreshed => tracing::debug!("proactive refresh done"),
                    RefreshCheck::Failed(ClientError::SessionExpired)
                        if this.phase() != AuthPhase::Authenticated =>
                    {
                        break
                    }
                    RefreshCheck::Failed(e) => {
                        tracing::warn!(err = %e, "proactive refresh failed");
                    }
                    RefreshCheck::Skipped | RefreshCheck::Fresh => {}
                }
            }
            tracing::debug!("refresh loop stopped");
        });
    }

    fn stop_refresh_loop(&self) {
        if let Some(token) = lock(&self.refresh_loop).take() {
            token.cancel();
        }
    }

    fn spawn_sync_listener(self: &Arc<Self>) {
        let mut changes = self.store.on_external_change(keys::TOKEN_KEYS);
        let mut events = self.events.subscribe();
        let cancel = self.cancel.clone();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    change = changes.next() => match change {
                        Some(change) => {
                            tracing::debug!(key = %change.key, "external token change");
                            this.sync_from_storage().await;
                        }
                        None => break,
                    },
                    event = events.recv() => match event {
                        Ok(ClientEvent::TokensCleared { .. })
                        | Err(broadcast::error::RecvError::Lagged(_)) => {
                            this.sync_from_storage().await;
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
