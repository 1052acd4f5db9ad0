// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated request gateway.
//!
//! Every outbound REST call goes through [`Gateway::request`]. For endpoints on
//! the requires-auth allow-list the gateway refreshes an expired access token
//! just in time, coalesces concurrent refreshes into one in-flight call, and
//! classifies a lingering 401 as either a dead session or a transient failure.
//! It never navigates anywhere; the shell decides what to do with the error.

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::api::models::RefreshResponse;
use crate::api::{AuthPolicy, Endpoint};
use crate::error::ClientError;
use crate::events::{ClientEvent, EventHub};
use crate::token::{self, TokenPair, TokenStore};

type RefreshFlight = Shared<BoxFuture<'static, Result<TokenPair, ClientError>>>;

/// Per-request overrides.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Option<Method>,
    pub body: Option<serde_json::Value>,
    pub query: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self { method: Some(Method::GET), ..Default::default() }
    }

    pub fn post() -> Self {
        Self { method: Some(Method::POST), ..Default::default() }
    }

    /// POST with a JSON body.
    pub fn json(body: serde_json::Value) -> Self {
        Self { method: Some(Method::POST), body: Some(body), ..Default::default() }
    }

    pub fn with_query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_owned(), value.to_string()));
        self
    }
}

pub struct Gateway {
    http: reqwest::Client,
    api_base: String,
    tokens: TokenStore,
    policy: AuthPolicy,
    events: EventHub,
    /// In-flight refresh shared by every caller, tagged with a generation so
    /// only the owning flight clears the slot.
    refresh_flight: Mutex<Option<(u64, RefreshFlight)>>,
    generation: std::sync::atomic::AtomicU64,
}

impl Gateway {
    pub fn new(
        http: reqwest::Client,
        api_base: impl Into<String>,
        tokens: TokenStore,
        policy: AuthPolicy,
        events: EventHub,
    ) -> Arc<Self> {
        Arc::new(Self {
            http,
            api_base: api_base.into(),
            tokens,
            policy,
            events,
            refresh_flight: Mutex::new(None),
            generation: std::sync::atomic::AtomicU64::new(0),
        })
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn url(&self, endpoint: &Endpoint) -> String {
        format!("{}{}", self.api_base, endpoint.path())
    }

    /// Issue a request, handling tokens according to the auth policy.
    ///
    /// Returns the raw response for any status except a 401 on an
    /// auth-required endpoint, which is classified into `SessionExpired` or
    /// `AuthTransient`.
    pub async fn request(
        self: &Arc<Self>,
        endpoint: &Endpoint,
        opts: RequestOptions,
    ) -> Result<Response, ClientError> {
        let needs_auth = self.policy.requires_auth(endpoint);
        let token = if needs_auth { Some(self.valid_access_token().await?) } else { self.tokens.access() };

        let resp = self.send(endpoint, &opts, token.as_deref()).await?;

        if needs_auth && resp.status() == StatusCode::UNAUTHORIZED {
            tracing::debug!(path = %endpoint.path(), "401 despite fresh access token");
            return Err(self.classify_unauthorized());
        }
        Ok(resp)
    }

    /// Request and decode a successful JSON body; non-success statuses become
    /// errors via [`ClientError::from_status`].
    pub async fn request_json<T: DeserializeOwned>(
        self: &Arc<Self>,
        endpoint: &Endpoint,
        opts: RequestOptions,
    ) -> Result<T, ClientError> {
        let resp = self.request(endpoint, opts).await?;
        read_json(resp).await
    }

    /// Refresh the token pair, joining an in-flight refresh if there is one.
    ///
    /// Both the proactive timer and the request path come through here. The
    /// flight leaves the slot as soon as it finishes, whether or not anyone is
    /// still awaiting it, so a later call always starts a fresh refresh.
    pub async fn refresh(self: &Arc<Self>) -> Result<TokenPair, ClientError> {
        let flight = {
            let mut slot = self.refresh_flight.lock().await;
            match slot.as_ref() {
                Some((_, flight)) => flight.clone(),
                None => {
                    let generation =
                        self.generation.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    // Spawned so a dropped caller never strands the others.
                    let this = Arc::clone(self);
                    let handle = tokio::spawn(async move {
                        let result = this.clone().do_refresh().await;
                        this.finish_flight(generation).await;
                        result
                    });
                    let flight: RefreshFlight = async move {
                        handle.await.unwrap_or_else(|e| {
                            Err(ClientError::AuthTransient(format!("refresh task failed: {e}")))
                        })
                    }
                    .boxed()
                    .shared();
                    *slot = Some((generation, flight.clone()));
                    flight
                }
            }
        };
        flight.await
    }

    /// Whether a refresh is currently in flight.
    pub async fn refresh_in_flight(&self) -> bool {
        self.refresh_flight.lock().await.is_some()
    }

    async fn finish_flight(&self, generation: u64) {
        let mut slot = self.refresh_flight.lock().await;
        if slot.as_ref().is_some_and(|(g, _)| *g == generation) {
            *slot = None;
        }
    }

    /// Clear tokens and announce it. Returns `SessionExpired` for convenience.
    pub fn expire_session(&self, reason: &str) -> ClientError {
        if let Err(e) = self.tokens.clear() {
            tracing::warn!(err = %e, "failed to clear tokens");
        }
        tracing::info!(reason, "session expired, tokens cleared");
        self.events.emit(ClientEvent::TokensCleared { reason: reason.to_owned() });
        ClientError::SessionExpired
    }

    async fn valid_access_token(self: &Arc<Self>) -> Result<String, ClientError> {
        if let Some(access) = self.tokens.access() {
            if !token::is_expired(&access) {
                return Ok(access);
            }
        }
        if self.tokens.is_refresh_expired() {
            return Err(self.expire_session("refresh token expired"));
        }
        tracing::debug!("access token expired, refreshing before request");
        Ok(self.refresh().await?.access)
    }

    fn classify_unauthorized(&self) -> ClientError {
        if self.tokens.is_refresh_expired() {
            self.expire_session("unauthorized and refresh token expired")
        } else {
            ClientError::AuthTransient("server rejected the access token".into())
        }
    }

    async fn do_refresh(self: Arc<Self>) -> Result<TokenPair, ClientError> {
        let Some(refresh) = self.tokens.refresh() else {
            return Err(self.expire_session("no refresh token"));
        };
        if token::is_expired(&refresh) {
            return Err(self.expire_session("refresh token expired"));
        }

        let body = serde_json::json!({ "refresh": refresh });
        let resp = match self.send(&Endpoint::Refresh, &RequestOptions::json(body), None).await {
            Ok(resp) => resp,
            Err(e) => return Err(self.refresh_failed(e.to_string())),
        };

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            // The server looked at the refresh token and rejected it.
            return Err(self.expire_session("refresh token rejected"));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let msg = crate::error::error_message(&text).unwrap_or_else(|| status.to_string());
            return Err(self.refresh_failed(format!("refresh failed ({status}): {msg}")));
        }
        let body: RefreshResponse = match resp.json().await {
            Ok(body) => body,
            Err(e) => return Err(self.refresh_failed(format!("bad refresh response: {e}"))),
        };

        // A logout or another context may have replaced the tokens while we
        // were waiting; never resurrect or overwrite someone else's session.
        if self.tokens.refresh().as_deref() != Some(refresh.as_str()) {
            tracing::debug!("tokens changed during refresh, discarding result");
            return self.tokens.get().ok_or(ClientError::SessionExpired);
        }

        let pair = TokenPair { access: body.access, refresh: body.refresh.unwrap_or(refresh) };
        self.tokens.set(&pair)?;
        self.events.emit(ClientEvent::TokensRefreshed);
        tracing::info!("access token refreshed");
        Ok(pair)
    }

    /// Transient refresh failure: keep tokens unless the refresh token has
    /// meanwhile expired.
    fn refresh_failed(&self, msg: String) -> ClientError {
        if self.tokens.is_refresh_expired() {
            return self.expire_session("refresh token expired");
        }
        tracing::warn!(err = %msg, "token refresh failed, keeping tokens");
        ClientError::AuthTransient(msg)
    }

    async fn send(
        &self,
        endpoint: &Endpoint,
        opts: &RequestOptions,
        token: Option<&str>,
    ) -> Result<Response, ClientError> {
        let method = opts.method.clone().unwrap_or_else(|| endpoint.default_method());
        let mut req = self.http.request(method, self.url(endpoint));
        if !opts.query.is_empty() {
            req = req.query(&opts.query);
        }
        if let Some(ref body) = opts.body {
            req = req.json(body);
        }
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.map_err(|e| ClientError::Transport(e.to_string()))
    }
}

/// Decode a JSON body, turning non-success statuses into errors.
pub async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(ClientError::from_status(status.as_u16(), &text));
    }
    resp.json().await.map_err(|e| ClientError::Decode(e.to_string()))
}

/// Drain a response, turning non-success statuses into errors.
pub async fn expect_success(resp: Response) -> Result<(), ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(ClientError::from_status(status.as_u16(), &text));
    }
    Ok(())
}
