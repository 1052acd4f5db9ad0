// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Email-code sign-in calls.

use std::sync::Arc;

use super::models::{UserProfile, VerifyEmailResponse};
use super::Endpoint;
use crate::error::ClientError;
use crate::gateway::{self, Gateway, RequestOptions};

/// Ask the server to email a one-time verification code.
pub async fn request_verification_code(
    gateway: &Arc<Gateway>,
    email: &str,
) -> Result<(), ClientError> {
    let email = normalize_email(email)?;
    let body = serde_json::json!({ "email": email });
    let resp = gateway.request(&Endpoint::RequestVerification, RequestOptions::json(body)).await?;
    gateway::expect_success(resp).await
}

/// Exchange an emailed code for a token pair and the signed-in profile.
///
/// Does not store the tokens; the session manager does that on sign-in.
pub async fn verify_email_code(
    gateway: &Arc<Gateway>,
    email: &str,
    code: &str,
) -> Result<VerifyEmailResponse, ClientError> {
    let email = normalize_email(email)?;
    let code = code.trim();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ClientError::Validation("verification code is malformed".into()));
    }
    let body = serde_json::json!({ "email": email, "code": code });
    gateway.request_json(&Endpoint::VerifyEmail, RequestOptions::json(body)).await
}

/// Fetch the signed-in user's profile.
pub async fn get_profile(gateway: &Arc<Gateway>) -> Result<UserProfile, ClientError> {
    gateway.request_json(&Endpoint::Profile, RequestOptions::get()).await
}

fn normalize_email(email: &str) -> Result<String, ClientError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
            Ok(email.to_lowercase())
        }
        _ => Err(ClientError::Validation(format!("invalid email address: {email}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_email;

    #[yare::parameterized(
        plain = { "a@b.com", Some("a@b.com") },
        trimmed_and_lowered = { "  Ann@Example.ORG ", Some("ann@example.org") },
        no_at = { "ab.com", None },
        no_local = { "@b.com", None },
        no_tld = { "a@localhost", None },
    )]
    fn email_normalization(input: &str, expected: Option<&str>) {
        assert_eq!(normalize_email(input).ok().as_deref(), expected);
    }
}
