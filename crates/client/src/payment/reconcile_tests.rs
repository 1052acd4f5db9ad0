// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn default_strategy_polls_every_ten_seconds_for_half_an_hour() {
    assert_eq!(
        PollStrategy::default(),
        PollStrategy::AutoPoll {
            interval: Duration::from_secs(10),
            max_duration: Duration::from_secs(1800),
        }
    );
}

#[test]
fn only_success_and_failure_are_final() {
    let failure = ReconcileOutcome::Failure {
        payment_id: "p1".into(),
        reason: NOT_FOUND_REASON.into(),
        invoice: None,
        payment_not_found: true,
    };
    assert!(failure.is_final());
    assert_eq!(failure.as_str(), "failure");

    let pending = inconclusive("p1", "offline".into(), Some(PaymentStatus::Waiting));
    assert!(!pending.is_final());
    assert!(!ReconcileOutcome::NothingPending.is_final());
}

#[test]
fn outcome_serializes_with_tag() -> anyhow::Result<()> {
    let value = serde_json::to_value(inconclusive("p1", "offline".into(), None))?;
    assert_eq!(value["outcome"], "inconclusive");
    assert_eq!(value["payment_id"], "p1");

    let value = serde_json::to_value(CancelOutcome::AlreadySettled {
        status: Some(PaymentStatus::Finished),
    })?;
    assert_eq!(value["outcome"], "already_settled");
    assert_eq!(value["status"], "finished");
    Ok(())
}

#[test]
fn in_flight_reason_names_status() {
    assert_eq!(
        in_flight_reason(Some(PaymentStatus::Confirming)),
        "payment still in progress (Confirming Payment)"
    );
    assert_eq!(in_flight_reason(None), "payment still in progress");
}

#[yare::parameterized(
    bad_request = { 400, true },
    not_found = { 404, true },
    conflict = { 409, true },
    forbidden = { 403, false },
    server = { 500, false },
)]
fn settled_statuses(code: u16, settled: bool) {
    let status = StatusCode::from_u16(code).expect("valid status");
    assert_eq!(is_settled_status(status), settled);
}
