// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn premium_level_accepts_false() -> anyhow::Result<()> {
    let status: PremiumStatus =
        serde_json::from_str(r#"{"has_premium": false, "subscription": null}"#)?;
    assert_eq!(status.has_premium, PremiumLevel::None);
    assert!(!status.is_active());

    let status: PremiumStatus = serde_json::from_str(r#"{"has_premium": "pending"}"#)?;
    assert!(status.is_payment_pending());

    let status: PremiumStatus = serde_json::from_str(
        r#"{"has_premium": "active", "subscription": {"id": 9, "days_remaining": 12}}"#,
    )?;
    assert!(status.is_active());
    assert_eq!(status.subscription.map(|s| s.id), Some("9".to_owned()));
    Ok(())
}

#[test]
fn create_subscription_response_with_numeric_ids() -> anyhow::Result<()> {
    let resp: CreateSubscriptionResponse = serde_json::from_str(
        r#"{
            "subscription": {"id": 41, "status": "pending"},
            "payment": {"id": 7001, "order_id": "o-1", "payment_url": "https://pay.test/i/7001"}
        }"#,
    )?;
    assert_eq!(resp.subscription.id, "41");
    let payment = resp.payment.ok_or_else(|| anyhow::anyhow!("missing payment"))?;
    assert_eq!(payment.id, "7001");
    assert_eq!(payment.order_id.as_deref(), Some("o-1"));
    Ok(())
}

#[test]
fn user_profile_keeps_unknown_fields() -> anyhow::Result<()> {
    let user: UserProfile =
        serde_json::from_str(r#"{"id": 3, "email": "a@b.com", "is_verified": true}"#)?;
    assert_eq!(user.id.as_deref(), Some("3"));
    assert_eq!(user.extra.get("is_verified"), Some(&serde_json::Value::Bool(true)));
    Ok(())
}

#[test]
fn refresh_response_without_rotation() -> anyhow::Result<()> {
    let resp: RefreshResponse = serde_json::from_str(r#"{"access": "x"}"#)?;
    assert_eq!(resp.refresh, None);
    Ok(())
}

#[test]
fn listing_accepts_array_or_page() -> anyhow::Result<()> {
    let bare: Listing<Plan> = serde_json::from_str(r#"[{"id": 1, "name": "Monthly"}]"#)?;
    let paged: Listing<Plan> =
        serde_json::from_str(r#"{"count": 1, "results": [{"id": "1", "name": "Monthly"}]}"#)?;
    assert_eq!(bare.into_vec(), paged.into_vec());
    Ok(())
}
