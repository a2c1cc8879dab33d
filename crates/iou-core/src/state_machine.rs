use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::debt::{Debt, PendingPayment, CANCELLED_MARKER};
use crate::error::LedgerError;
use crate::types::{
    Amount, IdentityId, OverdueStatus, PaymentStatus, PaymentType, Reminders, Role,
    REMINDER_OFFSETS_DAYS,
};

/// Who is driving a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// One of the two identities on the debt (or an outsider).
    Party(IdentityId),
    /// A background scanner.
    System,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Party(id) => write!(f, "{}", id),
            Self::System => write!(f, "system"),
        }
    }
}

/// Metadata edit applied by `updateDebt`. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtPatch {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminders: Option<Reminders>,
}

impl DebtPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.due_date.is_none() && self.reminders.is_none()
    }
}

/// Commands that drive a debt through its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebtCommand {
    /// Debtor proposes a payment; creditor must verify.
    RequestPayment { amount: Amount },
    /// Creditor records money received; settles immediately.
    AcknowledgePayment { amount: Amount },
    /// Counterparty of the proposer accepts or rejects the pending payment.
    VerifyPayment { accept: bool },
    /// Creditor edits metadata.
    Update(DebtPatch),
    /// Creditor forgives the remainder.
    Cancel,
    /// Scanner flags a debt whose due date has passed.
    MarkOverdue,
    /// Scanner claims a reminder slot before delivering it.
    MarkReminderSent { slot: usize },
}

impl DebtCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RequestPayment { .. } => "request_payment",
            Self::AcknowledgePayment { .. } => "acknowledge_payment",
            Self::VerifyPayment { .. } => "verify_payment",
            Self::Update(_) => "update",
            Self::Cancel => "cancel",
            Self::MarkOverdue => "mark_overdue",
            Self::MarkReminderSent { .. } => "mark_reminder_sent",
        }
    }
}

/// What a committed transition did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    Created { amount_total: Amount },
    PaymentRequested { amount: Amount },
    PaymentAccepted { amount: Amount, fully_settled: bool },
    PaymentRejected { amount: Amount },
    PaymentConfirmed { amount: Amount, fully_settled: bool },
    Updated { due_date_moved: bool },
    Cancelled { forgiven: Amount },
    MarkedOverdue,
    ReminderDue { slot: usize, days_before: i64 },
}

impl Outcome {
    /// Whether this transition moved the debt into `paid`.
    pub fn enters_paid(&self) -> bool {
        matches!(
            self,
            Self::PaymentAccepted { fully_settled: true, .. }
                | Self::PaymentConfirmed { fully_settled: true, .. }
                | Self::Cancelled { .. }
        )
    }

    /// Whether this transition fully settled the balance through a payment.
    /// Cancellation enters `paid` without a settlement.
    pub fn fully_settled(&self) -> bool {
        matches!(
            self,
            Self::PaymentAccepted { fully_settled: true, .. }
                | Self::PaymentConfirmed { fully_settled: true, .. }
        )
    }
}

/// A candidate next record plus a description of the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub debt: Debt,
    pub outcome: Outcome,
}

/// Applies [`DebtCommand`]s to a [`Debt`] snapshot.
///
/// Valid transitions:
/// - active → pending_verification (RequestPayment, debtor)
/// - active → active | paid (AcknowledgePayment, creditor)
/// - pending_verification → active | paid (VerifyPayment accept, counterparty)
/// - pending_verification → active (VerifyPayment reject, counterparty)
/// - active → active (Update, creditor)
/// - active → paid (Cancel, creditor)
/// - on_time → overdue (MarkOverdue, system)
///
/// `paid` is terminal. The machine is pure: it never touches storage, so the
/// ledger can re-run it against a fresh snapshot after a lost race.
pub struct DebtStateMachine;

impl DebtStateMachine {
    pub fn apply(
        debt: &Debt,
        actor: Actor,
        command: &DebtCommand,
        now: DateTime<Utc>,
    ) -> Result<Transition, LedgerError> {
        let role = match actor {
            Actor::Party(id) => Some(debt.role_of(id).ok_or(LedgerError::NotFound(debt.id))?),
            Actor::System => None,
        };

        let mut next = debt.clone();
        next.updated_at = now;

        let outcome = match command {
            DebtCommand::RequestPayment { amount } => {
                Self::require_role(role, Role::Debtor, "request a payment")?;
                Self::require_positive(*amount)?;
                Self::require_status(debt, PaymentStatus::Active)?;
                Self::require_within_remaining(debt, *amount)?;
                let requested_by = debt.receiver_identity_id;
                next.pending_payment = Some(PendingPayment {
                    amount: *amount,
                    requested_at: now,
                    requested_by,
                    payment_type: PaymentType::ReceiverToSender,
                    is_verified: None,
                    verified_at: None,
                });
                next.payment_status = PaymentStatus::PendingVerification;
                Outcome::PaymentRequested { amount: *amount }
            }

            DebtCommand::AcknowledgePayment { amount } => {
                Self::require_role(role, Role::Creditor, "acknowledge a payment")?;
                Self::require_positive(*amount)?;
                Self::require_status(debt, PaymentStatus::Active)?;
                Self::require_within_remaining(debt, *amount)?;
                next.amount_remaining = debt.amount_remaining - amount;
                let fully_settled = next.amount_remaining == 0;
                if fully_settled {
                    next.payment_status = PaymentStatus::Paid;
                }
                next.last_settlement = Some(PendingPayment {
                    amount: *amount,
                    requested_at: now,
                    requested_by: debt.sender_identity_id,
                    payment_type: PaymentType::ReceiverToSender,
                    is_verified: Some(true),
                    verified_at: Some(now),
                });
                Outcome::PaymentConfirmed {
                    amount: *amount,
                    fully_settled,
                }
            }

            DebtCommand::VerifyPayment { accept } => {
                Self::require_status(debt, PaymentStatus::PendingVerification)?;
                let pending = debt.pending_payment.as_ref().ok_or_else(|| {
                    LedgerError::InvalidState("no pending payment to verify".into())
                })?;
                match actor {
                    Actor::Party(id) if id != pending.requested_by => {}
                    Actor::Party(_) => {
                        return Err(LedgerError::Forbidden(
                            "a payment request must be verified by the other party".into(),
                        ))
                    }
                    Actor::System => {
                        return Err(LedgerError::Forbidden(
                            "payments are verified by a participant".into(),
                        ))
                    }
                }
                next.pending_payment = None;
                if *accept {
                    next.amount_remaining = debt.amount_remaining.saturating_sub(pending.amount);
                    let fully_settled = next.amount_remaining == 0;
                    next.payment_status = if fully_settled {
                        PaymentStatus::Paid
                    } else {
                        PaymentStatus::Active
                    };
                    next.last_settlement = Some(PendingPayment {
                        is_verified: Some(true),
                        verified_at: Some(now),
                        ..pending.clone()
                    });
                    Outcome::PaymentAccepted {
                        amount: pending.amount,
                        fully_settled,
                    }
                } else {
                    next.payment_status = PaymentStatus::Active;
                    Outcome::PaymentRejected {
                        amount: pending.amount,
                    }
                }
            }

            DebtCommand::Update(patch) => {
                Self::require_role(role, Role::Creditor, "update the debt")?;
                Self::require_status(debt, PaymentStatus::Active)?;
                if patch.is_empty() {
                    return Err(LedgerError::Validation("update has no fields".into()));
                }
                if let Some(description) = &patch.description {
                    next.description = description.clone();
                }
                if let Some(reminders) = patch.reminders {
                    next.reminders = reminders;
                }
                let mut due_date_moved = false;
                if let Some(due) = patch.due_date {
                    due_date_moved = debt.due_date != Some(due);
                    if due_date_moved {
                        next.reminders_sent = Reminders::none();
                    }
                    next.due_date = Some(due);
                    if due > now {
                        next.overdue_status = OverdueStatus::OnTime;
                    }
                }
                Outcome::Updated { due_date_moved }
            }

            DebtCommand::Cancel => {
                Self::require_role(role, Role::Creditor, "cancel the debt")?;
                Self::require_status(debt, PaymentStatus::Active)?;
                next.amount_remaining = 0;
                next.payment_status = PaymentStatus::Paid;
                next.description = if debt.description.is_empty() {
                    CANCELLED_MARKER.to_string()
                } else {
                    format!("{} {}", debt.description, CANCELLED_MARKER)
                };
                Outcome::Cancelled {
                    forgiven: debt.amount_remaining,
                }
            }

            DebtCommand::MarkOverdue => {
                Self::require_system(actor, "mark a debt overdue")?;
                Self::require_status(debt, PaymentStatus::Active)?;
                if debt.overdue_status == OverdueStatus::Overdue {
                    return Err(LedgerError::InvalidState("debt is already overdue".into()));
                }
                if debt.amount_remaining == 0 {
                    return Err(LedgerError::InvalidState("nothing left to collect".into()));
                }
                match debt.due_date {
                    Some(due) if due < now => {}
                    _ => {
                        return Err(LedgerError::InvalidState(
                            "due date has not passed".into(),
                        ))
                    }
                }
                next.overdue_status = OverdueStatus::Overdue;
                Outcome::MarkedOverdue
            }

            DebtCommand::MarkReminderSent { slot } => {
                Self::require_system(actor, "send reminders")?;
                Self::require_status(debt, PaymentStatus::Active)?;
                let days_before = *REMINDER_OFFSETS_DAYS.get(*slot).ok_or_else(|| {
                    LedgerError::Validation(format!("unknown reminder slot {}", slot))
                })?;
                if debt.amount_remaining == 0 {
                    return Err(LedgerError::InvalidState("nothing left to collect".into()));
                }
                if !debt.reminders.is_set(*slot) {
                    return Err(LedgerError::InvalidState(format!(
                        "reminder slot {} is disabled",
                        slot
                    )));
                }
                if debt.reminders_sent.is_set(*slot) {
                    return Err(LedgerError::InvalidState(format!(
                        "reminder slot {} already sent",
                        slot
                    )));
                }
                if debt.days_until_due(now) != Some(days_before) {
                    return Err(LedgerError::InvalidState(format!(
                        "reminder slot {} is not due",
                        slot
                    )));
                }
                next.reminders_sent = debt.reminders_sent.with(*slot);
                Outcome::ReminderDue {
                    slot: *slot,
                    days_before,
                }
            }
        };

        tracing::debug!(
            debt_id = %debt.id,
            actor = %actor,
            command = command.name(),
            from = %debt.payment_status,
            to = %next.payment_status,
            "debt state transition"
        );

        Ok(Transition {
            debt: next,
            outcome,
        })
    }

    /// Check a command against a snapshot without producing the next record.
    pub fn can_apply(debt: &Debt, actor: Actor, command: &DebtCommand, now: DateTime<Utc>) -> bool {
        Self::apply(debt, actor, command, now).is_ok()
    }

    fn require_role(role: Option<Role>, expected: Role, action: &str) -> Result<(), LedgerError> {
        match role {
            Some(r) if r == expected => Ok(()),
            _ => Err(LedgerError::Forbidden(format!(
                "only the {} may {}",
                expected, action
            ))),
        }
    }

    fn require_system(actor: Actor, action: &str) -> Result<(), LedgerError> {
        match actor {
            Actor::System => Ok(()),
            Actor::Party(_) => Err(LedgerError::Forbidden(format!(
                "participants may not {}",
                action
            ))),
        }
    }

    fn require_status(debt: &Debt, expected: PaymentStatus) -> Result<(), LedgerError> {
        if debt.payment_status == expected {
            return Ok(());
        }
        let reason = match debt.payment_status {
            PaymentStatus::Paid => format!("debt {} is already paid", debt.id),
            PaymentStatus::PendingVerification => {
                format!("debt {} has a payment awaiting verification", debt.id)
            }
            PaymentStatus::Active => format!("debt {} has no pending payment", debt.id),
        };
        Err(LedgerError::InvalidState(reason))
    }

    fn require_positive(amount: Amount) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::Validation("amount must be positive".into()));
        }
        Ok(())
    }

    fn require_within_remaining(debt: &Debt, amount: Amount) -> Result<(), LedgerError> {
        if amount > debt.amount_remaining {
            return Err(LedgerError::Validation(format!(
                "amount {} exceeds remaining balance {}",
                amount, debt.amount_remaining
            )));
        }
        Ok(())
    }
}
