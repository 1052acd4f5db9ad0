// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use super::*;
use crate::storage::{KeyValueStore, MemoryStore};

fn response(payment: bool) -> anyhow::Result<CreateSubscriptionResponse> {
    let json = if payment {
        r#"{"subscription": {"id": 3}, "payment": {"id": "p1", "order_id": "o1", "payment_url": "https://pay.test/p1"}}"#
    } else {
        r#"{"subscription": {"id": 3}}"#
    };
    Ok(serde_json::from_str(json)?)
}

#[test]
fn store_and_get() -> anyhow::Result<()> {
    let kv = Arc::new(MemoryStore::new());
    let pending = PendingPaymentStore::new(kv.clone());

    let stored = pending.store(&response(true)?)?.ok_or_else(|| anyhow::anyhow!("no record"))?;
    assert_eq!(stored.subscription_id, "3");
    assert_eq!(stored.payment_id, "p1");
    assert_eq!(pending.get(), Some(stored));

    // Storage layout uses the camelCase keys.
    let raw: serde_json::Value =
        serde_json::from_str(&kv.get(keys::PENDING_PAYMENT).unwrap_or_default())?;
    assert_eq!(raw["paymentId"], "p1");
    assert_eq!(raw["orderId"], "o1");
    assert!(raw["timestamp"].is_u64());
    Ok(())
}

#[test]
fn response_without_payment_stores_nothing() -> anyhow::Result<()> {
    let kv = Arc::new(MemoryStore::new());
    let pending = PendingPaymentStore::new(kv.clone());
    assert_eq!(pending.store(&response(false)?)?, None);
    assert!(kv.is_empty());
    Ok(())
}

#[test]
fn record_older_than_a_day_is_dropped() -> anyhow::Result<()> {
    let kv = Arc::new(MemoryStore::new());
    let pending = PendingPaymentStore::new(kv.clone());
    let created_at = epoch_ms() - 25 * 60 * 60 * 1000;
    pending.put(&PendingPayment {
        subscription_id: "3".into(),
        payment_id: "p1".into(),
        order_id: Some("o1".into()),
        created_at,
    })?;

    assert_eq!(pending.get(), None);
    assert_eq!(kv.get(keys::PENDING_PAYMENT), None);
    Ok(())
}

#[test]
fn unreadable_record_is_dropped() -> anyhow::Result<()> {
    let kv = Arc::new(MemoryStore::new());
    kv.set(keys::PENDING_PAYMENT, "{not json")?;
    let pending = PendingPaymentStore::new(kv.clone());
    assert_eq!(pending.get(), None);
    assert!(kv.is_empty());
    Ok(())
}

#[test]
fn new_subscribe_overwrites_and_clear_matches_by_id() -> anyhow::Result<()> {
    let kv = Arc::new(MemoryStore::new());
    let pending = PendingPaymentStore::new(kv);
    let now = epoch_ms();
    pending.put(&PendingPayment {
        subscription_id: "1".into(),
        payment_id: "old".into(),
        order_id: None,
        created_at: now,
    })?;
    pending.store(&response(true)?)?;

    assert!(!pending.clear_if_matches("old"));
    assert_eq!(pending.get().map(|p| p.payment_id), Some("p1".to_owned()));
    assert!(pending.clear_if_subscription("3"));
    assert_eq!(pending.get(), None);
    Ok(())
}
