// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Deserializer, Serialize};

use crate::token::TokenPair;

/// Accept numeric or string identifiers; the backend mixes both.
pub fn flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected id, got {other}"))),
    }
}

pub fn flexible_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!("expected id, got {other}"))),
    }
}

/// Signed-in user as returned by the profile endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, deserialize_with = "flexible_opt_id")]
    pub id: Option<String>,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Fields this client does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `POST verify-email` response.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyEmailResponse {
    pub tokens: TokenPair,
    pub user: UserProfile,
}

/// `POST refresh` response. Servers without rotation omit `refresh`.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<serde_json::Value>,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_expired: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Payment attached to a freshly created subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInfo {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default, deserialize_with = "flexible_opt_id")]
    pub order_id: Option<String>,
    #[serde(default)]
    pub payment_url: Option<String>,
}

/// `POST subscriptions` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSubscriptionResponse {
    pub subscription: Subscription,
    #[serde(default)]
    pub payment: Option<PaymentInfo>,
}

/// `POST subscriptions` request body.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSubscriptionRequest {
    pub plan_id: String,
    pub success_url: String,
    pub failure_url: String,
    pub cancel_url: String,
}

/// Premium level: the wire value is `"active"`, `"pending"`, or `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PremiumLevel {
    Active,
    Pending,
    None,
}

impl<'de> Deserialize<'de> for PremiumLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) if s == "active" => Self::Active,
            serde_json::Value::String(s) if s == "pending" => Self::Pending,
            serde_json::Value::Bool(true) => Self::Active,
            _ => Self::None,
        })
    }
}

/// `GET premium-status` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremiumStatus {
    pub has_premium: PremiumLevel,
    #[serde(default)]
    pub subscription: Option<Subscription>,
}

impl PremiumStatus {
    pub fn is_active(&self) -> bool {
        self.has_premium == PremiumLevel::Active
    }

    pub fn is_payment_pending(&self) -> bool {
        self.has_premium == PremiumLevel::Pending
    }
}

/// List endpoints answer with either a bare array or a paginated envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Items(Vec<T>),
    Page { results: Vec<T> },
}

impl<T> Listing<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Items(items) | Self::Page { results: items } => items,
        }
    }
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;
