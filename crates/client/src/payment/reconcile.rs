// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Payment reconciliation: confirm an external payment's final status and
//! bring local state in line with it.
//!
//! Each attempt goes `Idle -> Checking -> {Success, Failure, Inconclusive}` and
//! is returned as a [`ReconcileOutcome`]. Terminal statuses end the attempt
//! immediately. The pending record is kept whenever the result is
//! inconclusive, so a later attempt (after a reload or redirect-back) picks up
//! where this one stopped.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::pending::PendingPaymentStore;
use super::urls::PaymentReturn;
use super::{Invoice, PaymentStatus};
use crate::api::models::PremiumStatus;
use crate::api::Endpoint;
use crate::error::ClientError;
use crate::events::{ClientEvent, EventHub, NotificationLevel};
use crate::gateway::{self, Gateway, RequestOptions};
use crate::subscription::SubscriptionService;

pub const NOT_FOUND_REASON: &str =
    "Payment invoice not found. Please try creating a new subscription.";

/// How to wait for a final status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStrategy {
    /// One status check; a non-terminal status is inconclusive and the user
    /// retries manually.
    SingleCheck,
    /// Check every `interval` until a terminal status or `max_duration`.
    AutoPoll { interval: Duration, max_duration: Duration },
}

impl Default for PollStrategy {
    fn default() -> Self {
        Self::AutoPoll {
            interval: Duration::from_secs(10),
            max_duration: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// No pending payment to reconcile.
    NothingPending,
    Success { payment_id: String, invoice: Invoice, premium: Option<PremiumStatus> },
    Failure {
        payment_id: String,
        reason: String,
        invoice: Option<Invoice>,
        payment_not_found: bool,
    },
    /// Status unknown for now; the pending record is kept.
    Inconclusive { payment_id: String, reason: String, last_status: Option<PaymentStatus> },
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NothingPending => "nothing_pending",
            Self::Success { .. } => "success",
            Self::Failure { .. } => "failure",
            Self::Inconclusive { .. } => "inconclusive",
        }
    }

    /// Whether the outcome is final for this payment.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Failure { .. })
    }
}

/// Result of a user-initiated cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CancelOutcome {
    Cancelled,
    /// Nothing to cancel: the payment or subscription had already reached a
    /// final state. `status` is the payment's current status when known.
    AlreadySettled { status: Option<PaymentStatus> },
}

pub struct PaymentReconciler {
    gateway: Arc<Gateway>,
    pending: PendingPaymentStore,
    subscriptions: Arc<SubscriptionService>,
    strategy: PollStrategy,
    events: EventHub,
    cancel: CancellationToken,
}

impl PaymentReconciler {
    pub fn new(
        gateway: Arc<Gateway>,
        pending: PendingPaymentStore,
        subscriptions: Arc<SubscriptionService>,
        strategy: PollStrategy,
        events: EventHub,
    ) -> Self {
        Self { gateway, pending, subscriptions, strategy, events, cancel: CancellationToken::new() }
    }

    pub fn strategy(&self) -> PollStrategy {
        self.strategy
    }

    /// Stop any in-progress polling. Pending records are left in place.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Reconcile the stored pending payment, if any.
    ///
    /// Only `SessionExpired` is returned as an error; every other failure is
    /// folded into the outcome.
    pub async fn reconcile(&self) -> Result<ReconcileOutcome, ClientError> {
        match self.pending.get() {
            Some(pending) => self.reconcile_payment(&pending.payment_id).await,
            None => Ok(ReconcileOutcome::NothingPending),
        }
    }

    /// Reconcile after the provider redirected the user back.
    ///
    /// Falls back to the stored record when the URL carries no payment id.
    pub async fn reconcile_return(
        &self,
        ret: &PaymentReturn,
    ) -> Result<ReconcileOutcome, ClientError> {
        let payment_id = match ret.payment_id {
            Some(ref id) => Some(id.clone()),
            None => self
                .pending
                .get()
                .filter(|p| ret.order_id.is_none() || p.order_id == ret.order_id)
                .map(|p| p.payment_id),
        };
        tracing::debug!(kind = ?ret.kind, payment_id = ?payment_id, "payment return");
        match payment_id {
            Some(id) => self.reconcile_payment(&id).await,
            None => Ok(ReconcileOutcome::NothingPending),
        }
    }

    /// Check `payment_id` according to the configured strategy.
    pub async fn reconcile_payment(
        &self,
        payment_id: &str,
    ) -> Result<ReconcileOutcome, ClientError> {
        let started = Instant::now();
        let mut last_status = None;

        loop {
            match self.check_status(payment_id).await {
                Ok(invoice) if invoice.status.is_terminal_success() => {
                    return Ok(self.succeeded(payment_id, invoice).await);
                }
                Ok(invoice) if invoice.status.is_terminal_failure() => {
                    return Ok(self.failed(payment_id, invoice));
                }
                Ok(invoice) => {
                    tracing::debug!(payment_id, status = %invoice.status, "payment in flight");
                    last_status = Some(invoice.status);
                }
                Err(ClientError::PaymentNotFound(_)) => return Ok(self.not_found(payment_id)),
                Err(e) if e.requires_reauth() => return Err(e),
                Err(e) => {
                    tracing::warn!(payment_id, err = %e, "payment status check failed");
                    return Ok(inconclusive(payment_id, e.to_string(), last_status));
                }
            }

            let (interval, max_duration) = match self.strategy {
                PollStrategy::SingleCheck => {
                    return Ok(inconclusive(payment_id, in_flight_reason(last_status), last_status));
                }
                PollStrategy::AutoPoll { interval, max_duration } => (interval, max_duration),
            };
            if started.elapsed() + interval > max_duration {
                tracing::info!(payment_id, "payment polling timed out");
                return Ok(inconclusive(
                    payment_id,
                    format!("timed out: {}", in_flight_reason(last_status)),
                    last_status,
                ));
            }
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Ok(inconclusive(payment_id, "reconciliation stopped".into(), last_status));
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Fetch the invoice for `payment_id`. A 404 is `PaymentNotFound`.
    pub async fn check_status(&self, payment_id: &str) -> Result<Invoice, ClientError> {
        let resp = self
            .gateway
            .request(&Endpoint::Invoice(payment_id.to_owned()), RequestOptions::get())
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::PaymentNotFound(payment_id.to_owned()));
        }
        gateway::read_json(resp).await
    }

    /// Cancel an external payment. Cancelling a payment that already reached
    /// a final state reports that state instead of failing.
    pub async fn cancel_payment(&self, payment_id: &str) -> Result<CancelOutcome, ClientError> {
        let resp = self
            .gateway
            .request(&Endpoint::CancelInvoice(payment_id.to_owned()), RequestOptions::post())
            .await?;
        let status = resp.status();
        if status.is_success() {
            self.pending.clear_if_matches(payment_id);
            tracing::info!(payment_id, "payment cancelled");
            return Ok(CancelOutcome::Cancelled);
        }
        if !is_settled_status(status) {
            return Err(settle_error(resp).await);
        }

        match self.check_status(payment_id).await {
            Ok(invoice) if invoice.status.is_terminal() => {
                self.pending.clear_if_matches(payment_id);
                tracing::info!(payment_id, status = %invoice.status, "payment already settled");
                Ok(CancelOutcome::AlreadySettled { status: Some(invoice.status) })
            }
            Err(ClientError::PaymentNotFound(_)) => {
                self.pending.clear_if_matches(payment_id);
                Ok(CancelOutcome::AlreadySettled { status: None })
            }
            Ok(invoice) => Err(ClientError::Http {
                status: status.as_u16(),
                message: format!("payment cannot be cancelled while {}", invoice.status.label()),
            }),
            Err(e) => Err(e),
        }
    }

    /// Cancel a subscription, which also cancels its pending payments on the
    /// server. A subscription that is already gone or cancelled is settled.
    pub async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<CancelOutcome, ClientError> {
        let resp = self
            .gateway
            .request(
                &Endpoint::CancelSubscription(subscription_id.to_owned()),
                RequestOptions::post(),
            )
            .await?;
        let status = resp.status();
        if status.is_success() {
            self.pending.clear_if_subscription(subscription_id);
            tracing::info!(subscription_id, "subscription cancelled");
            return Ok(CancelOutcome::Cancelled);
        }
        if is_settled_status(status) {
            self.pending.clear_if_subscription(subscription_id);
            tracing::info!(subscription_id, %status, "subscription already settled");
            return Ok(CancelOutcome::AlreadySettled { status: None });
        }
        Err(settle_error(resp).await)
    }

    async fn succeeded(&self, payment_id: &str, invoice: Invoice) -> ReconcileOutcome {
        self.pending.clear_if_matches(payment_id);
        let premium = match self.subscriptions.premium_status().await {
            Ok(premium) => Some(premium),
            Err(e) => {
                tracing::warn!(err = %e, "premium status refresh failed after payment");
                None
            }
        };
        tracing::info!(payment_id, "payment completed");
        self.events.notify(
            NotificationLevel::Success,
            "Payment completed! Your premium subscription is now active.",
        );
        self.emit_outcome(payment_id, "success");
        ReconcileOutcome::Success { payment_id: payment_id.to_owned(), invoice, premium }
    }

    fn failed(&self, payment_id: &str, invoice: Invoice) -> ReconcileOutcome {
        self.pending.clear_if_matches(payment_id);
        let reason = invoice.status.label().to_owned();
        tracing::info!(payment_id, status = %invoice.status, "payment failed");
        self.events.notify(NotificationLevel::Error, reason.clone());
        self.emit_outcome(payment_id, "failure");
        ReconcileOutcome::Failure {
            payment_id: payment_id.to_owned(),
            reason,
            invoice: Some(invoice),
            payment_not_found: false,
        }
    }

    fn not_found(&self, payment_id: &str) -> ReconcileOutcome {
        self.pending.clear_if_matches(payment_id);
        tracing::info!(payment_id, "payment invoice not found");
        self.events.notify(NotificationLevel::Warning, NOT_FOUND_REASON);
        self.emit_outcome(payment_id, "failure");
        ReconcileOutcome::Failure {
            payment_id: payment_id.to_owned(),
            reason: NOT_FOUND_REASON.to_owned(),
            invoice: None,
            payment_not_found: true,
        }
    }

    fn emit_outcome(&self, payment_id: &str, outcome: &str) {
        self.events.emit(ClientEvent::PaymentReconciled {
            payment_id: payment_id.to_owned(),
            outcome: outcome.to_owned(),
        });
    }
}

fn inconclusive(
    payment_id: &str,
    reason: String,
    last_status: Option<PaymentStatus>,
) -> ReconcileOutcome {
    ReconcileOutcome::Inconclusive { payment_id: payment_id.to_owned(), reason, last_status }
}

fn in_flight_reason(status: Option<PaymentStatus>) -> String {
    match status {
        Some(status) => format!("payment still in progress ({})", status.label()),
        None => "payment still in progress".to_owned(),
    }
}

/// Statuses a cancel endpoint uses for "nothing left to cancel".
fn is_settled_status(status: StatusCode) -> bool {
    matches!(status, StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::CONFLICT)
}

async fn settle_error(resp: reqwest::Response) -> ClientError {
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    ClientError::from_status(status, &text)
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
