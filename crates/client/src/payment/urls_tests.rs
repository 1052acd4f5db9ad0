// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn urls_are_absolute_on_origin_with_ids() -> anyhow::Result<()> {
    let urls = PaymentUrls::for_order("https://app.test", "o 1", Some("p1"), &[])?;
    assert_eq!(urls.success_url, "https://app.test/payment/success?orderId=o+1&paymentId=p1");
    assert_eq!(urls.failure_url, "https://app.test/payment/failed?orderId=o+1&paymentId=p1");
    assert_eq!(urls.cancel_url, "https://app.test/payment/cancelled?orderId=o+1&paymentId=p1");
    Ok(())
}

#[test]
fn origin_path_and_query_are_replaced() -> anyhow::Result<()> {
    let urls = PaymentUrls::for_order("http://localhost:5173/jobs?x=1#top", "o1", None, &[])?;
    assert_eq!(urls.success_url, "http://localhost:5173/payment/success?orderId=o1");
    Ok(())
}

#[test]
fn non_http_origin_is_rejected() {
    assert!(matches!(
        PaymentUrls::for_order("mailto:a@b.com", "o1", None, &[]),
        Err(ClientError::Config(_))
    ));
    assert!(PaymentUrls::for_order("not a url", "o1", None, &[]).is_err());
}

#[test]
fn subscription_urls_carry_plan() -> anyhow::Result<()> {
    let (order_id, urls) = PaymentUrls::for_subscription("https://app.test", "7")?;
    assert!(order_id.starts_with("subscription_7_"));
    let ret = parse_return(&urls.success_url)?;
    assert_eq!(ret.kind, ReturnKind::Success);
    assert_eq!(ret.order_id.as_deref(), Some(order_id.as_str()));
    assert_eq!(ret.plan_id.as_deref(), Some("7"));
    assert_eq!(ret.payment_id, None);
    Ok(())
}

#[yare::parameterized(
    success = { "https://app.test/payment/success?orderId=o1&paymentId=p1", ReturnKind::Success },
    failed = { "https://app.test/payment/failed/?orderId=o1&paymentId=p1&reason=expired", ReturnKind::Failure },
    cancelled = { "https://app.test/payment/cancelled?paymentId=p1", ReturnKind::Cancelled },
)]
fn return_kinds(url: &str, kind: ReturnKind) {
    let ret = parse_return(url).expect("return URL should parse");
    assert_eq!(ret.kind, kind);
    assert_eq!(ret.payment_id.as_deref(), Some("p1"));
}

#[test]
fn failure_reason_is_read() -> anyhow::Result<()> {
    let ret = parse_return("https://app.test/payment/failed?orderId=o1&reason=insufficient+funds")?;
    assert_eq!(ret.reason.as_deref(), Some("insufficient funds"));
    Ok(())
}

#[test]
fn unrelated_path_is_rejected() {
    assert!(matches!(
        parse_return("https://app.test/jobs?orderId=o1"),
        Err(ClientError::Validation(_))
    ));
}
