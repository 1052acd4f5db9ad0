// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job-board client core: session/token lifecycle and payment reconciliation.

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod feed;
pub mod gateway;
pub mod payment;
pub mod prefs;
pub mod session;
pub mod storage;
pub mod subscription;
pub mod token;

use std::sync::{Arc, Once};

use crate::api::AuthPolicy;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::events::EventHub;
use crate::feed::{FeedAuth, JobFeed};
use crate::gateway::Gateway;
use crate::payment::pending::PendingPaymentStore;
use crate::payment::reconcile::{PaymentReconciler, ReconcileOutcome};
use crate::prefs::Preferences;
use crate::session::{SessionManager, SessionState};
use crate::storage::{FileStore, SharedStore};
use crate::subscription::SubscriptionService;
use crate::token::TokenStore;

/// Install the ring crypto provider for rustls. Safe to call repeatedly.
pub fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Every client component wired over one store and one event hub.
pub struct JobBoardClient {
    pub config: ClientConfig,
    pub store: SharedStore,
    pub events: EventHub,
    pub gateway: Arc<Gateway>,
    pub session: Arc<SessionManager>,
    pub subscriptions: Arc<SubscriptionService>,
    pub pending: PendingPaymentStore,
    pub reconciler: PaymentReconciler,
    pub prefs: Preferences,
}

impl JobBoardClient {
    pub fn new(config: ClientConfig, store: SharedStore) -> Result<Self, ClientError> {
        config.validate()?;
        let events = EventHub::new();
        let tokens = TokenStore::new(Arc::clone(&store));
        let gateway = Gateway::new(
            config.http_client(),
            config.api_base.clone(),
            tokens,
            AuthPolicy::default(),
            events.clone(),
        );
        let session = SessionManager::new(
            Arc::clone(&gateway),
            Arc::clone(&store),
            events.clone(),
            config.refresh_horizon(),
            config.refresh_check_interval(),
        );
        let pending = PendingPaymentStore::new(Arc::clone(&store));
        let subscriptions = Arc::new(SubscriptionService::new(
            Arc::clone(&gateway),
            pending.clone(),
            config.app_origin.clone(),
        ));
        let reconciler = PaymentReconciler::new(
            Arc::clone(&gateway),
            pending.clone(),
            Arc::clone(&subscriptions),
            config.poll_strategy(),
            events.clone(),
        );
        let prefs = Preferences::new(Arc::clone(&store));
        Ok(Self {
            config,
            store,
            events,
            gateway,
            session,
            subscriptions,
            pending,
            reconciler,
            prefs,
        })
    }

    /// Build a client persisting to the configured state directory.
    pub fn open(config: ClientConfig) -> anyhow::Result<Self> {
        let store = FileStore::open(&config.state_dir())?;
        tracing::debug!(path = %store.path().display(), "opened client state");
        Ok(Self::new(config, Arc::new(store))?)
    }

    /// Run the start-up auth check and start background session tasks.
    pub async fn start(&self) -> SessionState {
        self.session.start().await
    }

    /// Resume reconciliation of a stored pending payment, if signed in.
    pub async fn resume_payment(&self) -> Result<ReconcileOutcome, ClientError> {
        if !self.session.state().is_logged_in || self.pending.get().is_none() {
            return Ok(ReconcileOutcome::NothingPending);
        }
        self.reconciler.reconcile().await
    }

    /// A job feed for `user_id`. Requires a configured API key.
    pub fn job_feed(&self, user_id: impl Into<String>) -> Result<Arc<JobFeed>, ClientError> {
        let api_key = self
            .config
            .api_key
            .clone()
            .ok_or_else(|| ClientError::Config("job feed requires an API key".into()))?;
        install_crypto_provider();
        Ok(JobFeed::new(
            self.config.feed_url.clone(),
            FeedAuth { user_id: user_id.into(), api_key },
            self.config.feed_reconnect_interval(),
            self.config.feed_max_reconnects,
        ))
    }

    /// Stop background tasks.
    pub fn shutdown(&self) {
        self.session.stop();
        self.reconciler.stop();
    }
}
