// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External payment tracking: invoice status, the pending-payment record, and
//! reconciliation after the user returns from the payment site.

pub mod pending;
pub mod reconcile;
pub mod urls;

use serde::{Deserialize, Serialize};

use crate::api::models::flexible_opt_id;

/// Status reported by the external payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Waiting,
    Confirming,
    Confirmed,
    Sending,
    PartiallyPaid,
    Finished,
    Failed,
    Refunded,
    Expired,
    Cancelled,
    /// Anything the client does not recognise; treated as in flight.
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Confirming => "confirming",
            Self::Confirmed => "confirmed",
            Self::Sending => "sending",
            Self::PartiallyPaid => "partially_paid",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_terminal_success(&self) -> bool {
        matches!(self, Self::Finished)
    }

    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Expired | Self::Refunded | Self::Cancelled)
    }

    pub fn is_terminal(&self) -> bool {
        self.is_terminal_success() || self.is_terminal_failure()
    }

    /// Human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Waiting => "Waiting for Payment",
            Self::Confirming => "Confirming Payment",
            Self::Confirmed => "Payment Confirmed",
            Self::Sending => "Processing Payment",
            Self::PartiallyPaid => "Partially Paid",
            Self::Finished => "Payment Completed",
            Self::Failed => "Payment Failed",
            Self::Refunded => "Payment Refunded",
            Self::Expired => "Payment Expired",
            Self::Cancelled => "Payment Cancelled",
            Self::Unknown => "Unknown Status",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `GET payments/invoices/{id}` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(default, deserialize_with = "flexible_opt_id")]
    pub id: Option<String>,
    pub status: PaymentStatus,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default, deserialize_with = "flexible_opt_id")]
    pub order_id: Option<String>,
    #[serde(default)]
    pub price_amount: Option<serde_json::Value>,
    #[serde(default)]
    pub price_currency: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub can_be_paid: bool,
    #[serde(default)]
    pub payment_url: Option<String>,
}

impl Invoice {
    /// The user can still complete payment on the provider's page.
    pub fn can_still_be_paid(&self) -> bool {
        self.can_be_paid && !self.status.is_terminal()
    }
}

/// One page of `GET payments/invoices/`.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoicePage {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub results: Vec<Invoice>,
}

#[cfg(test)]
#[path = "payment_tests.rs"]
mod tests;
