// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! REST endpoint catalogue, the requires-auth allow-list, and wire models.

pub mod auth;
pub mod models;

use std::collections::HashSet;

use reqwest::Method;

/// A REST endpoint, relative to the configured API base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    RequestVerification,
    VerifyEmail,
    Refresh,
    Profile,
    Plans,
    Subscriptions,
    CancelSubscription(String),
    PremiumStatus,
    Invoices,
    Invoice(String),
    CancelInvoice(String),
}

/// Endpoint identity without path parameters, used by [`AuthPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    RequestVerification,
    VerifyEmail,
    Refresh,
    Profile,
    Plans,
    Subscriptions,
    CancelSubscription,
    PremiumStatus,
    Invoices,
    Invoice,
    CancelInvoice,
}

impl Endpoint {
    pub fn kind(&self) -> EndpointKind {
        match self {
            Self::RequestVerification => EndpointKind::RequestVerification,
            Self::VerifyEmail => EndpointKind::VerifyEmail,
            Self::Refresh => EndpointKind::Refresh,
            Self::Profile => EndpointKind::Profile,
            Self::Plans => EndpointKind::Plans,
            Self::Subscriptions => EndpointKind::Subscriptions,
            Self::CancelSubscription(_) => EndpointKind::CancelSubscription,
            Self::PremiumStatus => EndpointKind::PremiumStatus,
            Self::Invoices => EndpointKind::Invoices,
            Self::Invoice(_) => EndpointKind::Invoice,
            Self::CancelInvoice(_) => EndpointKind::CancelInvoice,
        }
    }

    /// Path relative to the API base (no leading slash).
    pub fn path(&self) -> String {
        match self {
            Self::RequestVerification => "user/auth/request-verification/".to_owned(),
            Self::VerifyEmail => "user/auth/verify-email/".to_owned(),
            Self::Refresh => "user/auth/refresh/".to_owned(),
            Self::Profile => "user/profile/".to_owned(),
            Self::Plans => "user/subscriptions/plans/".to_owned(),
            Self::Subscriptions => "user/subscriptions/".to_owned(),
            Self::CancelSubscription(id) => format!("user/subscriptions/{id}/cancel/"),
            Self::PremiumStatus => "user/premium-status/".to_owned(),
            Self::Invoices => "user/payments/invoices/".to_owned(),
            Self::Invoice(id) => format!("user/payments/invoices/{id}/"),
            Self::CancelInvoice(id) => format!("user/payments/invoices/{id}/cancel/"),
        }
    }

    /// Default method when the caller does not override it.
    pub fn default_method(&self) -> Method {
        match self {
            Self::RequestVerification
            | Self::VerifyEmail
            | Self::Refresh
            | Self::CancelSubscription(_)
            | Self::CancelInvoice(_) => Method::POST,
            _ => Method::GET,
        }
    }
}

/// Allow-list of endpoints that must carry a valid access token.
///
/// Endpoints outside the list bypass token logic: a stored token is attached
/// if present, but never refreshed or waited on.
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    kinds: HashSet<EndpointKind>,
}

impl AuthPolicy {
    pub fn new(kinds: impl IntoIterator<Item = EndpointKind>) -> Self {
        Self { kinds: kinds.into_iter().collect() }
    }

    pub fn requires_auth(&self, endpoint: &Endpoint) -> bool {
        self.kinds.contains(&endpoint.kind())
    }
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self::new([
            EndpointKind::Profile,
            EndpointKind::Subscriptions,
            EndpointKind::CancelSubscription,
            EndpointKind::PremiumStatus,
            EndpointKind::Invoices,
            EndpointKind::Invoice,
            EndpointKind::CancelInvoice,
        ])
    }
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
