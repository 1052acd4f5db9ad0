// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ClientError;
use crate::payment::reconcile::PollStrategy;

pub const DEFAULT_API_BASE: &str = "https://social.m-gh.com/api/v1/";
pub const DEFAULT_APP_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_FEED_URL: &str = "wss://social.m-gh.com/ws/";

/// How the payment reconciler waits for a final status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PollMode {
    /// Check once; the user retries manually.
    Single,
    /// Poll on a fixed interval until a terminal status or the ceiling.
    Auto,
}

/// Configuration for the job-board client.
#[derive(Debug, Clone, clap::Args)]
pub struct ClientConfig {
    /// Base URL of the REST API (trailing slash required).
    #[arg(long, default_value = DEFAULT_API_BASE, env = "JOBBOARD_API_BASE")]
    pub api_base: String,

    /// Origin the payment provider redirects back to.
    #[arg(long, default_value = DEFAULT_APP_ORIGIN, env = "JOBBOARD_APP_ORIGIN")]
    pub app_origin: String,

    /// WebSocket URL for live job updates.
    #[arg(long, default_value = DEFAULT_FEED_URL, env = "JOBBOARD_FEED_URL")]
    pub feed_url: String,

    /// Public API key sent when authenticating the job feed.
    #[arg(long, env = "JOBBOARD_API_KEY")]
    pub api_key: Option<String>,

    /// Directory for persisted client state. Defaults to the XDG state dir.
    #[arg(long, env = "JOBBOARD_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Refresh the access token when it expires within this many seconds.
    #[arg(long, default_value_t = 120, env = "JOBBOARD_REFRESH_HORIZON_SECS")]
    pub refresh_horizon_secs: u64,

    /// Expected access token lifetime in seconds. Must exceed the horizon.
    #[arg(long, default_value_t = 300, env = "JOBBOARD_ACCESS_TOKEN_LIFETIME_SECS")]
    pub access_token_lifetime_secs: u64,

    /// Proactive refresh check interval in milliseconds.
    #[arg(long, default_value_t = 60_000, env = "JOBBOARD_REFRESH_CHECK_MS")]
    pub refresh_check_ms: u64,

    /// Payment status strategy.
    #[arg(long, value_enum, default_value_t = PollMode::Auto, env = "JOBBOARD_PAYMENT_POLL_MODE")]
    pub payment_poll_mode: PollMode,

    /// Payment status poll interval in milliseconds.
    #[arg(long, default_value_t = 10_000, env = "JOBBOARD_PAYMENT_POLL_MS")]
    pub payment_poll_ms: u64,

    /// Give up polling (result is inconclusive) after this many milliseconds.
    #[arg(long, default_value_t = 1_800_000, env = "JOBBOARD_PAYMENT_POLL_MAX_MS")]
    pub payment_poll_max_ms: u64,

    /// HTTP request timeout in milliseconds.
    #[arg(long, default_value_t = 30_000, env = "JOBBOARD_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// Delay between job feed reconnect attempts in milliseconds.
    #[arg(long, default_value_t = 5_000, env = "JOBBOARD_FEED_RECONNECT_MS")]
    pub feed_reconnect_ms: u64,

    /// Job feed reconnect attempts before giving up.
    #[arg(long, default_value_t = 5, env = "JOBBOARD_FEED_MAX_RECONNECTS")]
    pub feed_max_reconnects: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_owned(),
            app_origin: DEFAULT_APP_ORIGIN.to_owned(),
            feed_url: DEFAULT_FEED_URL.to_owned(),
            api_key: None,
            state_dir: None,
            refresh_horizon_secs: 120,
            access_token_lifetime_secs: 300,
            refresh_check_ms: 60_000,
            payment_poll_mode: PollMode::Auto,
            payment_poll_ms: 10_000,
            payment_poll_max_ms: 1_800_000,
            request_timeout_ms: 30_000,
            feed_reconnect_ms: 5_000,
            feed_max_reconnects: 5,
        }
    }
}

impl ClientConfig {
    /// Reject configurations that cannot work at runtime.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.refresh_horizon_secs >= self.access_token_lifetime_secs {
            return Err(ClientError::Config(format!(
                "refresh horizon ({}s) must be shorter than the access token lifetime ({}s)",
                self.refresh_horizon_secs, self.access_token_lifetime_secs
            )));
        }
        if !self.api_base.ends_with('/') {
            return Err(ClientError::Config(format!(
                "api base must end with '/': {}",
                self.api_base
            )));
        }
        if !(self.app_origin.starts_with("http://") || self.app_origin.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "app origin must be an absolute http(s) URL: {}",
                self.app_origin
            )));
        }
        if self.refresh_check_ms == 0 || self.payment_poll_ms == 0 {
            return Err(ClientError::Config("poll intervals must be non-zero".into()));
        }
        Ok(())
    }

    pub fn refresh_horizon(&self) -> Duration {
        Duration::from_secs(self.refresh_horizon_secs)
    }

    pub fn access_token_lifetime(&self) -> Duration {
        Duration::from_secs(self.access_token_lifetime_secs)
    }

    pub fn refresh_check_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_check_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn feed_reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.feed_reconnect_ms)
    }

    pub fn poll_strategy(&self) -> PollStrategy {
        match self.payment_poll_mode {
            PollMode::Single => PollStrategy::SingleCheck,
            PollMode::Auto => PollStrategy::AutoPoll {
                interval: Duration::from_millis(self.payment_poll_ms),
                max_duration: Duration::from_millis(self.payment_poll_max_ms),
            },
        }
    }

    /// Resolve the directory holding persisted client state.
    ///
    /// Checks `--state-dir`/`JOBBOARD_STATE_DIR`, then `$XDG_STATE_HOME/jobboard`,
    /// then `$HOME/.local/state/jobboard`.
    pub fn state_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.state_dir {
            return dir.clone();
        }
        if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
            return PathBuf::from(xdg).join("jobboard");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local/state/jobboard");
        }
        PathBuf::from(".jobboard")
    }

    /// Build the shared HTTP client.
    pub fn http_client(&self) -> reqwest::Client {
        crate::install_crypto_provider();
        reqwest::Client::builder().timeout(self.request_timeout()).build().unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
