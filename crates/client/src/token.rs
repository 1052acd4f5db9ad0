// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Access/refresh token persistence and expiry decoding.
//!
//! Tokens are JWT-shaped (`header.payload.signature`). Only the payload's `exp`
//! claim is read; signatures are the server's business. Anything that cannot
//! be decoded counts as expired.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::storage::{keys, SharedStore};

/// Access/refresh token pair as returned by the auth endpoints.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &redact(&self.access))
            .field("refresh", &redact(&self.refresh))
            .finish()
    }
}

fn redact(token: &str) -> String {
    let head: String = token.chars().take(6).collect();
    format!("{head}…({} chars)", token.len())
}

/// Claims read from a token payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Claims {
    /// Expiry as epoch seconds.
    pub exp: u64,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Decode the payload claims without verifying the signature.
pub fn decode_claims(token: &str) -> Option<Claims> {
    let mut parts = token.split('.');
    let (_header, payload) = (parts.next()?, parts.next()?);
    parts.next()?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Expiry instant of `token` as epoch seconds.
pub fn expires_at(token: &str) -> Option<u64> {
    decode_claims(token).map(|c| c.exp)
}

/// True if the token is past its expiry or cannot be decoded.
pub fn is_expired(token: &str) -> bool {
    match expires_at(token) {
        Some(exp) => exp <= epoch_secs(),
        None => true,
    }
}

/// True if the token expires within `horizon` (or cannot be decoded).
pub fn is_expiring_soon(token: &str, horizon: Duration) -> bool {
    match expires_at(token) {
        Some(exp) => exp < epoch_secs().saturating_add(horizon.as_secs()),
        None => true,
    }
}

/// Persisted token pair over the shared key/value store.
///
/// Never performs network calls.
#[derive(Clone)]
pub struct TokenStore {
    store: SharedStore,
}

impl TokenStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Both tokens, if both are stored.
    pub fn get(&self) -> Option<TokenPair> {
        Some(TokenPair { access: self.access()?, refresh: self.refresh()? })
    }

    pub fn access(&self) -> Option<String> {
        self.store.get(keys::ACCESS_TOKEN).filter(|t| !t.is_empty())
    }

    pub fn refresh(&self) -> Option<String> {
        self.store.get(keys::REFRESH_TOKEN).filter(|t| !t.is_empty())
    }

    pub fn set(&self, pair: &TokenPair) -> Result<(), ClientError> {
        self.store
            .set(keys::ACCESS_TOKEN, &pair.access)
            .and_then(|()| self.store.set(keys::REFRESH_TOKEN, &pair.refresh))
            .map_err(|e| ClientError::Storage(format!("failed to store tokens: {e}")))
    }

    pub fn clear(&self) -> Result<(), ClientError> {
        self.store
            .remove(keys::ACCESS_TOKEN)
            .and_then(|()| self.store.remove(keys::REFRESH_TOKEN))
            .map_err(|e| ClientError::Storage(format!("failed to clear tokens: {e}")))
    }

    /// Absent counts as expired.
    pub fn is_access_expired(&self) -> bool {
        self.access().map_or(true, |t| is_expired(&t))
    }

    /// Absent counts as expired.
    pub fn is_refresh_expired(&self) -> bool {
        self.refresh().map_or(true, |t| is_expired(&t))
    }

    pub fn is_access_expiring_soon(&self, horizon: Duration) -> bool {
        self.access().map_or(true, |t| is_expiring_soon(&t, horizon))
    }

    /// A usable access token is stored.
    pub fn is_authenticated(&self) -> bool {
        !self.is_access_expired()
    }

    /// Access token expiry as epoch seconds.
    pub fn access_expires_at(&self) -> Option<u64> {
        self.access().and_then(|t| expires_at(&t))
    }
}

/// Return current epoch seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Build an unsigned JWT-shaped token expiring at `exp`. Used by tests and
/// local fakes.
pub fn unsigned_token(exp: u64, token_type: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD
        .encode(serde_json::json!({ "exp": exp, "token_type": token_type }).to_string());
    format!("{header}.{payload}.sig")
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
