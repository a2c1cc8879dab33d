use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::types::{
    Amount, DebtId, IdentityId, OverdueStatus, PaymentStatus, PaymentType, Reminders, Role,
};

const SECONDS_PER_DAY: i64 = 86_400;

/// Annotation appended to the description of a cancelled debt.
pub const CANCELLED_MARKER: &str = "[cancelled]";

/// A settlement proposal (or, once verified, a settlement record).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPayment {
    /// Amount proposed, in minor units.
    pub amount: Amount,
    /// When the proposal was made.
    pub requested_at: DateTime<Utc>,
    /// Who made the proposal.
    pub requested_by: IdentityId,
    /// Direction of money.
    pub payment_type: PaymentType,
    /// Verdict, once one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
    /// When the verdict was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

/// Input for opening a new debt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDebt {
    /// Creditor.
    pub sender: IdentityId,
    /// Debtor.
    pub receiver: IdentityId,
    /// Total owed, in minor units.
    pub amount_total: Amount,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminders: Option<Reminders>,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewDebt {
    pub fn new(sender: IdentityId, receiver: IdentityId, amount_total: Amount) -> Self {
        Self {
            sender,
            receiver,
            amount_total,
            due_date: None,
            reminders: None,
            description: None,
        }
    }

    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_reminders(mut self, reminders: Reminders) -> Self {
        self.reminders = Some(reminders);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Reject malformed input before anything is stored.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.amount_total == 0 {
            return Err(LedgerError::Validation(
                "amount_total must be positive".into(),
            ));
        }
        if self.sender == self.receiver {
            return Err(LedgerError::SelfReference);
        }
        Ok(())
    }
}

/// A bilateral IOU between a creditor (sender) and a debtor (receiver).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debt {
    pub id: DebtId,
    /// Creditor.
    pub sender_identity_id: IdentityId,
    /// Debtor.
    pub receiver_identity_id: IdentityId,
    pub amount_total: Amount,
    pub amount_remaining: Amount,
    pub payment_status: PaymentStatus,
    pub overdue_status: OverdueStatus,
    pub due_date: Option<DateTime<Utc>>,
    /// Which reminder slots are enabled. Set at creation or by the creditor.
    pub reminders: Reminders,
    /// Which reminder slots have been delivered for the current due date.
    #[serde(default = "Reminders::none")]
    pub reminders_sent: Reminders,
    /// Present exactly while `payment_status` is `pending_verification`.
    pub pending_payment: Option<PendingPayment>,
    /// Most recent committed settlement.
    #[serde(default)]
    pub last_settlement: Option<PendingPayment>,
    pub description: String,
    /// Compare-and-swap sequence number. Assigned by the store.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Debt {
    /// Build the initial record for a validated [`NewDebt`]. Version 0 means "not yet stored".
    pub fn open(new: NewDebt, now: DateTime<Utc>) -> Result<Self, LedgerError> {
        new.validate()?;
        Ok(Self {
            id: DebtId::new(),
            sender_identity_id: new.sender,
            receiver_identity_id: new.receiver,
            amount_total: new.amount_total,
            amount_remaining: new.amount_total,
            payment_status: PaymentStatus::Active,
            overdue_status: OverdueStatus::OnTime,
            due_date: new.due_date,
            reminders: new.reminders.unwrap_or_default(),
            reminders_sent: Reminders::none(),
            pending_payment: None,
            last_settlement: None,
            description: new.description.unwrap_or_default(),
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Role of `identity` on this debt, or `None` for outsiders.
    pub fn role_of(&self, identity: IdentityId) -> Option<Role> {
        if identity == self.sender_identity_id {
            Some(Role::Creditor)
        } else if identity == self.receiver_identity_id {
            Some(Role::Debtor)
        } else {
            None
        }
    }

    pub fn is_participant(&self, identity: IdentityId) -> bool {
        self.role_of(identity).is_some()
    }

    /// The other party, if `identity` is a participant.
    pub fn counterparty(&self, identity: IdentityId) -> Option<IdentityId> {
        match self.role_of(identity)? {
            Role::Creditor => Some(self.receiver_identity_id),
            Role::Debtor => Some(self.sender_identity_id),
        }
    }

    /// Creditor first, debtor second.
    pub fn participants(&self) -> [IdentityId; 2] {
        [self.sender_identity_id, self.receiver_identity_id]
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status.is_final()
    }

    /// Whole days until the due date, floored. Negative once the date has passed.
    pub fn days_until_due(&self, now: DateTime<Utc>) -> Option<i64> {
        self.due_date
            .map(|due| (due - now).num_seconds().div_euclid(SECONDS_PER_DAY))
    }

    /// Check the record-level invariants that must hold at every observable point.
    pub fn check_invariants(&self) -> Result<(), LedgerError> {
        if self.amount_total == 0 {
            return Err(LedgerError::Validation("amount_total must be positive".into()));
        }
        if self.sender_identity_id == self.receiver_identity_id {
            return Err(LedgerError::SelfReference);
        }
        if self.amount_remaining > self.amount_total {
            return Err(LedgerError::Validation(format!(
                "amount_remaining {} exceeds amount_total {}",
                self.amount_remaining, self.amount_total
            )));
        }
        if self.payment_status == PaymentStatus::Paid && self.amount_remaining != 0 {
            return Err(LedgerError::InvalidState(
                "paid debt must have zero remaining".into(),
            ));
        }
        let pending = self.payment_status == PaymentStatus::PendingVerification;
        if pending != self.pending_payment.is_some() {
            return Err(LedgerError::InvalidState(
                "pending payment must be present exactly while pending verification".into(),
            ));
        }
        if self.overdue_status == OverdueStatus::Overdue && self.due_date.is_none() {
            return Err(LedgerError::InvalidState(
                "overdue debt must have a due date".into(),
            ));
        }
        Ok(())
    }
}
