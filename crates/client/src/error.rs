// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Errors surfaced by the client core.
///
/// Network-layer failures are translated into this taxonomy before they reach
/// the shell; nothing above the gateway sees a raw `reqwest::Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The refresh token is confirmed expired. Tokens have been cleared and the
    /// user must sign in again.
    SessionExpired,
    /// A refresh attempt failed for a reason other than refresh-token expiry.
    /// Tokens are preserved; the caller may retry.
    AuthTransient(String),
    /// The external invoice does not exist (404).
    PaymentNotFound(String),
    /// Payment status could not be determined (transport failure or timeout).
    PaymentInconclusive(String),
    /// The server rejected the input (malformed email, wrong code, ...).
    Validation(String),
    /// Non-success HTTP status not covered by a more specific variant.
    Http { status: u16, message: String },
    /// Connection, timeout, or TLS failure.
    Transport(String),
    /// Persisted storage could not be read or written.
    Storage(String),
    /// Invalid configuration.
    Config(String),
    /// A response body did not have the expected shape.
    Decode(String),
}

impl ClientError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::AuthTransient(_) => "AUTH_TRANSIENT",
            Self::PaymentNotFound(_) => "PAYMENT_NOT_FOUND",
            Self::PaymentInconclusive(_) => "PAYMENT_INCONCLUSIVE",
            Self::Validation(_) => "VALIDATION",
            Self::Http { .. } => "HTTP",
            Self::Transport(_) => "TRANSPORT",
            Self::Storage(_) => "STORAGE",
            Self::Config(_) => "CONFIG",
            Self::Decode(_) => "DECODE",
        }
    }

    /// Whether retrying the same operation later may succeed without the user
    /// doing anything else (such as signing in again).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AuthTransient(_) | Self::PaymentInconclusive(_) | Self::Transport(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether the shell should send the user back to the sign-in prompt.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Build an error from a non-success response status and its body.
    ///
    /// 400 and 422 map to `Validation`; everything else to `Http`.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = error_message(body).unwrap_or_else(|| format!("request failed ({status})"));
        match status {
            400 | 422 => Self::Validation(message),
            _ => Self::Http { status, message },
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionExpired => f.write_str("session expired, please sign in again"),
            Self::AuthTransient(msg) => write!(f, "authentication temporarily unavailable: {msg}"),
            Self::PaymentNotFound(msg) => write!(f, "payment invoice not found: {msg}"),
            Self::PaymentInconclusive(msg) => write!(f, "unable to confirm payment status: {msg}"),
            Self::Validation(msg) => f.write_str(msg),
            Self::Http { status, message } => write!(f, "{message} ({status})"),
            Self::Transport(msg) => write!(f, "network error: {msg}"),
            Self::Storage(msg) => write!(f, "storage error: {msg}"),
            Self::Config(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Decode(msg) => write!(f, "unexpected response: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Extract the human-readable message from an API error payload.
///
/// The backend uses `message`, `detail`, or `error` depending on the endpoint;
/// the first one present wins.
pub fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "detail", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()).map(str::to_owned))
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
