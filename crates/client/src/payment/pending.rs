// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::models::CreateSubscriptionResponse;
use crate::error::ClientError;
use crate::storage::{keys, SharedStore};
use crate::token::epoch_ms;

/// Records older than this are discarded on read.
pub const PENDING_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// An external payment the user was redirected to and has not yet resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPayment {
    #[serde(rename = "subscriptionId")]
    pub subscription_id: String,
    #[serde(rename = "paymentId")]
    pub payment_id: String,
    #[serde(rename = "orderId", default)]
    pub order_id: Option<String>,
    /// Creation time, epoch milliseconds.
    #[serde(rename = "timestamp")]
    pub created_at: u64,
}

impl PendingPayment {
    pub fn age(&self, now_ms: u64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.created_at))
    }

    pub fn is_stale(&self, now_ms: u64) -> bool {
        self.age(now_ms) > PENDING_TTL
    }
}

/// The single persisted pending-payment record.
#[derive(Clone)]
pub struct PendingPaymentStore {
    store: SharedStore,
}

impl PendingPaymentStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Record the payment from a subscription response, replacing any
    /// previous record. Returns `None` if the response needs no payment.
    pub fn store(
        &self,
        resp: &CreateSubscriptionResponse,
    ) -> Result<Option<PendingPayment>, ClientError> {
        let Some(ref payment) = resp.payment else {
            return Ok(None);
        };
        let pending = PendingPayment {
            subscription_id: resp.subscription.id.clone(),
            payment_id: payment.id.clone(),
            order_id: payment.order_id.clone(),
            created_at: epoch_ms(),
        };
        self.put(&pending)?;
        Ok(Some(pending))
    }

    /// Write a record as-is.
    pub fn put(&self, pending: &PendingPayment) -> Result<(), ClientError> {
        let json = serde_json::to_string(pending)
            .map_err(|e| ClientError::Storage(format!("failed to encode pending payment: {e}")))?;
        self.store
            .set(keys::PENDING_PAYMENT, &json)
            .map_err(|e| ClientError::Storage(format!("failed to store pending payment: {e}")))?;
        tracing::debug!(payment_id = %pending.payment_id, "pending payment stored");
        Ok(())
    }

    /// The current record, unless it is stale or unreadable (then it is
    /// removed).
    pub fn get(&self) -> Option<PendingPayment> {
        let raw = self.store.get(keys::PENDING_PAYMENT)?;
        match serde_json::from_str::<PendingPayment>(&raw) {
            Ok(pending) if !pending.is_stale(epoch_ms()) => Some(pending),
            Ok(pending) => {
                tracing::info!(payment_id = %pending.payment_id, "discarding stale pending payment");
                self.clear();
                None
            }
            Err(e) => {
                tracing::warn!(err = %e, "discarding unreadable pending payment");
                self.clear();
                None
            }
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.remove(keys::PENDING_PAYMENT) {
            tracing::warn!(err = %e, "failed to clear pending payment");
        }
    }

    /// Clear the record only if it belongs to `payment_id`.
    pub fn clear_if_matches(&self, payment_id: &str) -> bool {
        match self.get() {
            Some(pending) if pending.payment_id == payment_id => {
                self.clear();
                true
            }
            _ => false,
        }
    }

    /// Clear the record only if it belongs to `subscription_id`.
    pub fn clear_if_subscription(&self, subscription_id: &str) -> bool {
        match self.get() {
            Some(pending) if pending.subscription_id == subscription_id => {
                self.clear();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;
