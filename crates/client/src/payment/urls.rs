// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redirect URLs handed to the payment provider, and parsing of the URL the
//! user lands on when they come back.

use reqwest::Url;
use serde::Serialize;

use crate::error::ClientError;
use crate::token::epoch_ms;

pub const SUCCESS_PATH: &str = "/payment/success";
pub const FAILURE_PATH: &str = "/payment/failed";
pub const CANCEL_PATH: &str = "/payment/cancelled";

/// Absolute success/failure/cancel URLs on the app origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentUrls {
    pub success_url: String,
    pub failure_url: String,
    pub cancel_url: String,
}

impl PaymentUrls {
    /// Build the three redirect URLs, each carrying `orderId`, `paymentId`
    /// (when known), and any extra query pairs.
    pub fn for_order(
        origin: &str,
        order_id: &str,
        payment_id: Option<&str>,
        extra: &[(&str, &str)],
    ) -> Result<Self, ClientError> {
        let base = Url::parse(origin)
            .map_err(|e| ClientError::Config(format!("invalid app origin {origin}: {e}")))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!("app origin must be http(s): {origin}")));
        }

        let build = |path: &str| {
            let mut url = base.clone();
            url.set_path(path);
            url.set_fragment(None);
            {
                let mut q = url.query_pairs_mut();
                q.clear();
                q.append_pair("orderId", order_id);
                if let Some(id) = payment_id {
                    q.append_pair("paymentId", id);
                }
                for (k, v) in extra {
                    q.append_pair(k, v);
                }
            }
            String::from(url)
        };

        Ok(Self {
            success_url: build(SUCCESS_PATH),
            failure_url: build(FAILURE_PATH),
            cancel_url: build(CANCEL_PATH),
        })
    }

    /// URLs for a new subscription purchase. Returns the generated order id
    /// alongside.
    pub fn for_subscription(origin: &str, plan_id: &str) -> Result<(String, Self), ClientError> {
        let order_id = subscription_order_id(plan_id, epoch_ms());
        let urls =
            Self::for_order(origin, &order_id, None, &[("planId", plan_id), ("type", "subscription")])?;
        Ok((order_id, urls))
    }
}

pub fn subscription_order_id(plan_id: &str, now_ms: u64) -> String {
    format!("subscription_{plan_id}_{now_ms}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnKind {
    Success,
    Failure,
    Cancelled,
}

/// What the provider told us on redirect-back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentReturn {
    pub kind: ReturnKind,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub plan_id: Option<String>,
    pub reason: Option<String>,
}

/// Parse a redirect-back URL produced by [`PaymentUrls`].
pub fn parse_return(url: &str) -> Result<PaymentReturn, ClientError> {
    let url = Url::parse(url)
        .map_err(|e| ClientError::Validation(format!("invalid return URL: {e}")))?;
    let kind = match url.path().trim_end_matches('/') {
        SUCCESS_PATH => ReturnKind::Success,
        FAILURE_PATH => ReturnKind::Failure,
        CANCEL_PATH => ReturnKind::Cancelled,
        other => {
            return Err(ClientError::Validation(format!("not a payment return path: {other}")))
        }
    };

    let mut ret =
        PaymentReturn { kind, order_id: None, payment_id: None, plan_id: None, reason: None };
    for (key, value) in url.query_pairs() {
        let value = Some(value.into_owned()).filter(|v| !v.is_empty());
        match key.as_ref() {
            "orderId" => ret.order_id = value,
            "paymentId" => ret.payment_id = value,
            "planId" => ret.plan_id = value,
            "reason" => ret.reason = value,
            _ => {}
        }
    }
    Ok(ret)
}

#[cfg(test)]
#[path = "urls_tests.rs"]
mod tests;
