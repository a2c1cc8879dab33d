//! Event envelope published to rooms on every committed change.

use chrono::{DateTime, Utc};
use iou_core::{Debt, IdentityId, Outcome};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminated event names on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DebtEventKind {
    #[serde(rename = "debt.created")]
    Created,
    #[serde(rename = "debt.payment_requested")]
    PaymentRequested,
    #[serde(rename = "debt.payment_accepted")]
    PaymentAccepted,
    #[serde(rename = "debt.payment_confirmed")]
    PaymentConfirmed,
    #[serde(rename = "debt.payment_rejected")]
    PaymentRejected,
    #[serde(rename = "debt.updated")]
    Updated,
    #[serde(rename = "debt.cancelled")]
    Cancelled,
    #[serde(rename = "debt.overdue")]
    Overdue,
    #[serde(rename = "debt.reminder")]
    Reminder,
}

impl DebtEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "debt.created",
            Self::PaymentRequested => "debt.payment_requested",
            Self::PaymentAccepted => "debt.payment_accepted",
            Self::PaymentConfirmed => "debt.payment_confirmed",
            Self::PaymentRejected => "debt.payment_rejected",
            Self::Updated => "debt.updated",
            Self::Cancelled => "debt.cancelled",
            Self::Overdue => "debt.overdue",
            Self::Reminder => "debt.reminder",
        }
    }

    /// The event name a committed outcome is announced under.
    pub fn from_outcome(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Created { .. } => Self::Created,
            Outcome::PaymentRequested { .. } => Self::PaymentRequested,
            Outcome::PaymentAccepted { .. } => Self::PaymentAccepted,
            Outcome::PaymentRejected { .. } => Self::PaymentRejected,
            Outcome::PaymentConfirmed { .. } => Self::PaymentConfirmed,
            Outcome::Updated { .. } => Self::Updated,
            Outcome::Cancelled { .. } => Self::Cancelled,
            Outcome::MarkedOverdue => Self::Overdue,
            Outcome::ReminderDue { .. } => Self::Reminder,
        }
    }
}

impl fmt::Display for DebtEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full snapshot of a debt after a committed change, plus why it changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtEvent {
    /// Event name.
    pub name: DebtEventKind,
    /// Discriminated reason for the change.
    pub reason: Outcome,
    /// The debt as committed.
    pub debt: Debt,
    /// Participant who caused the change; `None` for scheduler events.
    pub actor: Option<IdentityId>,
    pub emitted_at: DateTime<Utc>,
}

impl DebtEvent {
    pub fn new(debt: Debt, reason: Outcome, actor: Option<IdentityId>) -> Self {
        Self {
            name: DebtEventKind::from_outcome(&reason),
            reason,
            debt,
            actor,
            emitted_at: Utc::now(),
        }
    }

    /// Ledger version the snapshot was committed at.
    pub fn version(&self) -> u64 {
        self.debt.version
    }
}
