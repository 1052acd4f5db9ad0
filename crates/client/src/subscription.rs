// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plans, premium status, and starting a subscription purchase.

use std::sync::Arc;

use serde::Serialize;

use crate::api::models::{
    CreateSubscriptionRequest, CreateSubscriptionResponse, Listing, Plan, PremiumStatus,
    Subscription,
};
use crate::api::Endpoint;
use crate::error::ClientError;
use crate::gateway::{Gateway, RequestOptions};
use crate::payment::pending::{PendingPayment, PendingPaymentStore};
use crate::payment::urls::PaymentUrls;
use crate::payment::InvoicePage;

/// Result of [`SubscriptionService::subscribe`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubscribeOutcome {
    /// The user must pay on the provider's site. The pending record is stored.
    PaymentRequired { subscription: Subscription, pending: PendingPayment, payment_url: String },
    /// No external payment needed; premium status after activation.
    Activated { subscription: Subscription, premium: PremiumStatus },
}

pub struct SubscriptionService {
    gateway: Arc<Gateway>,
    pending: PendingPaymentStore,
    app_origin: String,
}

impl SubscriptionService {
    pub fn new(
        gateway: Arc<Gateway>,
        pending: PendingPaymentStore,
        app_origin: impl Into<String>,
    ) -> Self {
        Self { gateway, pending, app_origin: app_origin.into() }
    }

    pub async fn plans(&self) -> Result<Vec<Plan>, ClientError> {
        let listing: Listing<Plan> =
            self.gateway.request_json(&Endpoint::Plans, RequestOptions::get()).await?;
        Ok(listing.into_vec())
    }

    pub async fn premium_status(&self) -> Result<PremiumStatus, ClientError> {
        self.gateway.request_json(&Endpoint::PremiumStatus, RequestOptions::get()).await
    }

    pub async fn subscriptions(&self) -> Result<Vec<Subscription>, ClientError> {
        let listing: Listing<Subscription> =
            self.gateway.request_json(&Endpoint::Subscriptions, RequestOptions::get()).await?;
        Ok(listing.into_vec())
    }

    pub async fn payment_history(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<InvoicePage, ClientError> {
        let opts =
            RequestOptions::get().with_query("page", page).with_query("page_size", page_size);
        self.gateway.request_json(&Endpoint::Invoices, opts).await
    }

    /// Create a subscription for `plan_id`.
    ///
    /// When the server hands back a payment URL the pending payment is
    /// persisted before returning, so reconciliation can resume after the
    /// user comes back from the provider.
    pub async fn subscribe(&self, plan_id: &str) -> Result<SubscribeOutcome, ClientError> {
        let (order_id, urls) = PaymentUrls::for_subscription(&self.app_origin, plan_id)?;
        let req = CreateSubscriptionRequest {
            plan_id: plan_id.to_owned(),
            success_url: urls.success_url,
            failure_url: urls.failure_url,
            cancel_url: urls.cancel_url,
        };
        let body = serde_json::to_value(&req)
            .map_err(|e| ClientError::Decode(format!("failed to encode request: {e}")))?;
        let mut resp: CreateSubscriptionResponse =
            self.gateway.request_json(&Endpoint::Subscriptions, RequestOptions::json(body)).await?;

        let payment_url = resp.payment.as_ref().and_then(|p| p.payment_url.clone());
        if let (Some(payment_url), Some(payment)) = (payment_url, resp.payment.as_mut()) {
            payment.order_id.get_or_insert(order_id);
            if let Some(pending) = self.pending.store(&resp)? {
                tracing::info!(
                    plan_id,
                    payment_id = %pending.payment_id,
                    "subscription awaiting external payment"
                );
                return Ok(SubscribeOutcome::PaymentRequired {
                    subscription: resp.subscription,
                    pending,
                    payment_url,
                });
            }
        }

        let premium = self.premium_status().await?;
        tracing::info!(plan_id, "subscription activated without payment");
        Ok(SubscribeOutcome::Activated { subscription: resp.subscription, premium })
    }
}
